//! HTTP server for scheduler operations
//!
//! Provides:
//! - Scheduler lifecycle (`/scheduler`, `/scheduler/start`, `/scheduler/stop`)
//! - Job listing, rescheduling and force-run (`/jobs/*`)
//! - Execution ledger queries (`/executions`)
//! - Whole-partition snapshot reads (`/snapshots/*`)
//! - Trading calendar lookups (`/calendar`)
//! - Realtime refresh and cache reads (`/realtime/*`)

use crate::config::ControlConfig;
use crate::control::handlers;
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the control router over shared state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/", get(handlers::health_check))
        // Scheduler
        .route("/scheduler", get(handlers::scheduler_status))
        .route("/scheduler/start", post(handlers::start_scheduler))
        .route("/scheduler/stop", post(handlers::stop_scheduler))
        // Jobs
        .route("/jobs", get(handlers::list_jobs))
        .route("/jobs/:job_id", put(handlers::update_job))
        .route("/jobs/:job_id/run", post(handlers::run_job))
        // Ledger
        .route("/executions", get(handlers::list_executions))
        .route("/executions/stats", get(handlers::execution_stats))
        // Snapshots
        .route("/snapshots/:dataset", get(handlers::get_snapshots))
        .route("/snapshots/:dataset/dates", get(handlers::list_snapshot_dates))
        .route("/snapshots/:dataset/count", get(handlers::partition_count))
        // Trading calendar
        .route("/calendar", get(handlers::trading_days))
        .route("/calendar/refresh", post(handlers::refresh_calendar))
        // Realtime
        .route("/realtime/refresh", post(handlers::refresh_realtime))
        .route("/realtime/:dataset", get(handlers::get_realtime))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Control server manager
pub struct ControlServer {
    state: Arc<AppState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ControlServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            shutdown_tx: None,
            handle: None,
        }
    }

    /// Start the server, returning the bound address
    pub async fn start(&mut self, config: &ControlConfig) -> Result<SocketAddr> {
        if self.is_running() {
            return Err(AppError::Internal("Control server already running".to_string()));
        }

        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid control address: {}", e)))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let app = router(self.state.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        info!("Starting control server on {}", local_addr);

        self.handle = Some(tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Control server shutting down");
            });

            if let Err(e) = server.await {
                error!("Control server error: {}", e);
            }
        }));

        info!("  GET  http://{}/health", local_addr);
        info!("  GET  http://{}/jobs", local_addr);
        info!("  POST http://{}/jobs/{{job_id}}/run", local_addr);
        info!("  GET  http://{}/executions", local_addr);

        Ok(local_addr)
    }

    /// Stop the server and wait for it to drain
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("Control server stop signal sent");
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::provider::mock::MockProvider;
    use serde_json::{json, Value};

    async fn start_server(dir: &tempfile::TempDir) -> (ControlServer, String) {
        start_server_with(dir, MockProvider::new()).await
    }

    async fn start_server_with(
        dir: &tempfile::TempDir,
        provider: MockProvider,
    ) -> (ControlServer, String) {
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let state = Arc::new(AppState::with_provider(config, Arc::new(provider)).unwrap());
        let mut server = ControlServer::new(state);
        let control = ControlConfig {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        let addr = server.start(&control).await.unwrap();
        (server, format!("http://{}", addr))
    }

    #[tokio::test]
    async fn test_health_and_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, base) = start_server(&dir).await;
        let client = reqwest::Client::new();

        let health: Value = client.get(format!("{}/health", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(health["status"], "success");
        assert_eq!(health["data"]["scheduler_running"], false);

        let jobs: Value = client.get(format!("{}/jobs", base)).send().await.unwrap().json().await.unwrap();
        let jobs = jobs["data"].as_array().unwrap();
        assert!(jobs.iter().any(|j| j["job_id"] == "daily_snapshot_sync"));

        let missing = client
            .put(format!("{}/jobs/no_such_job", base))
            .json(&json!({ "hour": 16 }))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        let invalid = client
            .put(format!("{}/jobs/daily_snapshot_sync", base))
            .json(&json!({ "hour": 24 }))
            .send()
            .await
            .unwrap();
        assert_eq!(invalid.status(), reqwest::StatusCode::BAD_REQUEST);

        server.stop().await;
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_force_run_writes_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, base) = start_server(&dir).await;
        let client = reqwest::Client::new();

        let run = client
            .post(format!("{}/jobs/zt_pool_recheck/run", base))
            .json(&json!({ "date": "2025-06-10" }))
            .send()
            .await
            .unwrap();
        assert_eq!(run.status(), reqwest::StatusCode::OK);
        let run: Value = run.json().await.unwrap();
        assert_eq!(run["data"]["job_id"], "zt_pool_recheck");

        let ledger: Value = client
            .get(format!("{}/executions?date=2025-06-10", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(ledger["data"].as_array().unwrap().len(), 1);

        let half = client
            .get(format!("{}/executions?start=2025-06-01", base))
            .send()
            .await
            .unwrap();
        assert_eq!(half.status(), reqwest::StatusCode::BAD_REQUEST);

        let stats: Value = client
            .get(format!("{}/executions/stats", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["data"]["total"], 1);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_snapshot_reads() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, base) = start_server(&dir).await;
        let client = reqwest::Client::new();

        let empty: Value = client
            .get(format!("{}/snapshots/zt_pool?date=2025-06-10", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(empty["data"]["count"], 0);

        let no_range = client.get(format!("{}/snapshots/zt_pool", base)).send().await.unwrap();
        assert_eq!(no_range.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = no_range.json().await.unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let dates: Value = client
            .get(format!("{}/snapshots/index_quote/dates", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(dates["data"].as_array().unwrap().is_empty());

        server.stop().await;
    }

    #[tokio::test]
    async fn test_realtime_lookup_errors() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, base) = start_server(&dir).await;
        let client = reqwest::Client::new();

        let unknown = client.get(format!("{}/realtime/bogus", base)).send().await.unwrap();
        assert_eq!(unknown.status(), reqwest::StatusCode::BAD_REQUEST);

        let empty = client.get(format!("{}/realtime/zt_pool", base)).send().await.unwrap();
        assert_eq!(empty.status(), reqwest::StatusCode::NOT_FOUND);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_malformed_run_body_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut server, base) = start_server(&dir).await;
        let client = reqwest::Client::new();

        let invalid = client
            .post(format!("{}/jobs/zt_pool_recheck/run", base))
            .json(&json!({ "date": "2025-13-45", "force": true }))
            .send()
            .await
            .unwrap();
        assert_eq!(invalid.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = invalid.json().await.unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let garbage = client
            .post(format!("{}/jobs/zt_pool_recheck/run", base))
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(garbage.status(), reqwest::StatusCode::BAD_REQUEST);

        let stats: Value = client
            .get(format!("{}/executions/stats", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["data"]["total"], 0);

        // No body at all runs with defaults
        let bare = client
            .post(format!("{}/jobs/zt_pool_recheck/run", base))
            .send()
            .await
            .unwrap();
        assert_eq!(bare.status(), reqwest::StatusCode::OK);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_calendar_range() {
        let dir = tempfile::tempdir().unwrap();
        let rows = ["2025-06-05", "2025-06-06", "2025-06-09", "2025-06-10"]
            .iter()
            .map(|d| json!({ "trade_date": d }))
            .collect();
        let provider = MockProvider::new().with_rows("tool_trade_date_hist_sina", rows);
        let (mut server, base) = start_server_with(&dir, provider).await;
        let client = reqwest::Client::new();

        let refreshed: Value = client
            .post(format!("{}/calendar/refresh", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(refreshed["data"]["dates"], 4);

        let range: Value = client
            .get(format!("{}/calendar?start=2025-06-06&end=2025-06-09", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(range["data"]["trading_days"], json!(["2025-06-06", "2025-06-09"]));

        let reversed = client
            .get(format!("{}/calendar?start=2025-06-09&end=2025-06-06", base))
            .send()
            .await
            .unwrap();
        assert_eq!(reversed.status(), reqwest::StatusCode::BAD_REQUEST);

        server.stop().await;
    }
}
