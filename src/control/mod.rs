//! Operations control API
//!
//! A small axum server for inspecting and driving the sync scheduler.

pub mod handlers;
pub mod server;
pub mod types;

pub use server::{router, ControlServer};
pub use types::ApiResponse;
