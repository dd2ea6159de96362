//! Services Layer
//!
//! Read-side logic shared by the control API and the binary. Sync itself
//! lives in `sync`; services only read the store or the realtime cache.
//!
//! # Services
//!
//! - `SnapshotService` - Whole-partition reads for downstream consumers
//! - `LedgerService` - Execution history queries
//! - `RealtimeService` - Intraday refresh into an in-memory cache

pub mod ledger_service;
pub mod realtime_service;
pub mod snapshot_service;

pub use ledger_service::{ExecutionQuery, LedgerService};
pub use realtime_service::{RealtimeService, RealtimeSnapshot, RefreshResult};
pub use snapshot_service::{SnapshotResult, SnapshotService};
