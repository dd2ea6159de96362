//! AShare Sync - Daily A-share market snapshot synchronization
//!
//! Pulls end-of-day sector rankings, limit-up/down pools and index quotes
//! from an AKTools endpoint on a schedule, gated by the exchange trading
//! calendar, and stores one replaceable partition per dataset and day.

pub mod adapters;
pub mod calendar;
pub mod config;
pub mod control;
pub mod dataset;
pub mod db;
pub mod error;
pub mod provider;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod sync;

use config::AppConfig;
use control::ControlServer;
use state::AppState;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize and run the sync service until Ctrl-C
pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ashare_sync_lib=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting AShare Sync...");

    let config = AppConfig::from_env()?;
    let control_config = config.control.clone();
    let state = Arc::new(AppState::new(config)?);
    tracing::info!("Application state initialized");

    if state.scheduler.start().await? {
        tracing::info!("Sync scheduler started");
    }

    let mut server = ControlServer::new(state.clone());
    if control_config.enabled {
        if let Err(e) = server.start(&control_config).await {
            tracing::error!("Failed to start control server: {}", e);
        }
    } else {
        tracing::info!("Control server is disabled");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested, waiting for running syncs");

    state.scheduler.stop().await;
    server.stop().await;

    tracing::info!("AShare Sync stopped");
    Ok(())
}
