//! Application state management

use crate::calendar::TradingCalendar;
use crate::config::AppConfig;
use crate::db::sqlite::SqliteDb;
use crate::error::Result;
use crate::provider::{AkToolsProvider, MarketDataProvider};
use crate::scheduler::SyncScheduler;
use crate::services::RealtimeService;
use crate::sync::{Orchestrator, RetryPolicy, StepRegistry};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Application state shared by the scheduler and the control server
pub struct AppState {
    pub config: AppConfig,

    /// SQLite connection pool
    pub sqlite: Arc<SqliteDb>,

    /// Trading-day gate
    pub calendar: Arc<TradingCalendar>,

    pub orchestrator: Arc<Orchestrator>,

    pub scheduler: Arc<SyncScheduler>,

    pub realtime: Arc<RealtimeService>,

    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create application state with the configured AKTools provider
    pub fn new(config: AppConfig) -> Result<Self> {
        let provider = Arc::new(AkToolsProvider::new(
            &config.provider_url,
            config.provider_timeout,
        )?);
        tracing::info!("Market data provider: {}", config.provider_url);
        Self::with_provider(config, provider)
    }

    /// Create application state around any provider
    pub fn with_provider(
        config: AppConfig,
        provider: Arc<dyn MarketDataProvider>,
    ) -> Result<Self> {
        // Create data directory if it doesn't exist
        std::fs::create_dir_all(&config.data_dir)?;
        tracing::info!("Data directory: {:?}", config.data_dir);

        let sqlite = Arc::new(SqliteDb::new(&config.database_path(), config.db_pool_size)?);

        let retry = RetryPolicy::new(config.fetch_max_attempts, config.fetch_base_delay);
        let registry = Arc::new(StepRegistry::new(provider.clone()));
        let calendar = Arc::new(TradingCalendar::new(provider.clone(), sqlite.clone()));

        let orchestrator = Arc::new(Orchestrator::new(
            sqlite.clone(),
            calendar.clone(),
            registry.clone(),
            retry,
            config.sync_workers,
            config.market_tz,
        ));
        let scheduler = Arc::new(SyncScheduler::new(sqlite.clone(), orchestrator.clone()));
        let realtime = Arc::new(RealtimeService::new(
            registry,
            retry,
            config.realtime_workers,
            config.market_tz,
        ));

        Ok(Self {
            config,
            sqlite,
            calendar,
            orchestrator,
            scheduler,
            realtime,
            started_at: Utc::now(),
        })
    }
}
