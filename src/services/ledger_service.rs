//! Ledger Service
//!
//! Execution history queries used by the control API.

use crate::db::sqlite::models::ExecutionRecord;
use crate::db::sqlite::LedgerStats;
use crate::db::with_db;
use crate::error::{AppError, Result};
use crate::state::AppState;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

pub const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 1000;

/// Ledger filter; the first matching form wins
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionQuery {
    pub date: Option<NaiveDate>,
    pub job_id: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Ledger service for execution history
pub struct LedgerService;

impl LedgerService {
    /// Query the ledger by date, job id, date range, or latest entries
    pub async fn query(state: &AppState, query: ExecutionQuery) -> Result<Vec<ExecutionRecord>> {
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        info!("LedgerService::query - {:?}", query);

        match query {
            ExecutionQuery { date: Some(date), .. } => {
                with_db(&state.sqlite, move |db| db.get_executions_by_date(date)).await
            }
            ExecutionQuery {
                job_id: Some(job_id),
                ..
            } => with_db(&state.sqlite, move |db| db.get_executions_by_job(&job_id, limit)).await,
            ExecutionQuery {
                start: Some(start),
                end: Some(end),
                ..
            } => {
                if start > end {
                    return Err(AppError::Validation(format!(
                        "start {} is after end {}",
                        start, end
                    )));
                }
                with_db(&state.sqlite, move |db| db.get_executions_between(start, end)).await
            }
            ExecutionQuery { start: Some(_), .. } | ExecutionQuery { end: Some(_), .. } => Err(
                AppError::Validation("start and end must be given together".to_string()),
            ),
            _ => with_db(&state.sqlite, move |db| db.get_recent_executions(limit)).await,
        }
    }

    pub async fn stats(state: &AppState) -> Result<LedgerStats> {
        with_db(&state.sqlite, |db| db.get_execution_stats()).await
    }
}
