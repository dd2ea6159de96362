//! Dataset sync steps
//!
//! A step fetches one dataset (with retry) and replaces its partition.
//! Steps never return errors: every failure is folded into a
//! [`StepOutcome`] so the orchestrator can keep going.

use crate::adapters::FetchAdapter;
use crate::dataset::Dataset;
use crate::db::sqlite::models::DatasetResult;
use crate::db::sqlite::SqliteDb;
use crate::db::with_db;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Retry schedule for provider fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Terminal state of one dataset within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Rows fetched and the partition replaced
    Saved,
    /// Provider returned nothing; the existing partition was kept
    Empty,
    /// Not attempted for this target date
    Skipped,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Saved => "saved",
            StepStatus::Empty => "empty",
            StepStatus::Skipped => "skipped",
            StepStatus::Failed => "failed",
        }
    }
}

/// Result of one dataset step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub dataset: Dataset,
    pub status: StepStatus,
    pub rows: usize,
    pub attempts: u32,
    pub error: Option<String>,
    /// Why a non-failed step did nothing
    pub note: Option<String>,
}

impl StepOutcome {
    pub fn failed(dataset: Dataset, attempts: u32, error: impl Into<String>) -> Self {
        Self {
            dataset,
            status: StepStatus::Failed,
            rows: 0,
            attempts,
            error: Some(error.into()),
            note: None,
        }
    }

    pub fn skipped(dataset: Dataset, reason: impl Into<String>) -> Self {
        Self {
            dataset,
            status: StepStatus::Skipped,
            rows: 0,
            attempts: 0,
            error: None,
            note: Some(reason.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }

    /// Ledger representation
    pub fn to_result(&self) -> DatasetResult {
        DatasetResult {
            dataset: self.dataset,
            status: self.status.as_str().to_string(),
            rows: self.rows,
            attempts: self.attempts,
            error: self.error.clone(),
            note: self.note.clone(),
        }
    }
}

/// Shared inputs of every step in one run
pub struct StepContext {
    pub db: Arc<SqliteDb>,
    pub retry: RetryPolicy,
    /// Current date in the market timezone
    pub market_date: NaiveDate,
}

/// Uniform interface the orchestrator runs
#[async_trait]
pub trait SyncStep: Send + Sync {
    fn dataset(&self) -> Dataset;

    async fn run(&self, target_date: NaiveDate, ctx: &StepContext) -> StepOutcome;

    /// Fetch and normalize without touching the store
    async fn fetch_preview(
        &self,
        as_of: NaiveDate,
        retry: RetryPolicy,
    ) -> Result<Vec<serde_json::Value>>;
}

/// Fetch-then-replace step for one adapter
pub struct DatasetSyncStep<A> {
    adapter: A,
}

impl<A: FetchAdapter> DatasetSyncStep<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    /// Fetch with exponential backoff on transient errors
    async fn fetch_with_retry(
        &self,
        target_date: NaiveDate,
        retry: RetryPolicy,
    ) -> (u32, Result<Vec<A::Record>>) {
        let dataset = self.adapter.dataset();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.adapter.fetch(target_date).await {
                Ok(result) => return (attempt, Ok(result.rows)),
                Err(e) if e.is_transient() && attempt < retry.max_attempts => {
                    let delay = retry.delay_after(attempt);
                    tracing::warn!(
                        "Fetch {} attempt {}/{} failed: {}; retrying in {:?}",
                        dataset,
                        attempt,
                        retry.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return (attempt, Err(e)),
            }
        }
    }
}

#[async_trait]
impl<A> SyncStep for DatasetSyncStep<A>
where
    A: FetchAdapter + 'static,
{
    fn dataset(&self) -> Dataset {
        self.adapter.dataset()
    }

    async fn run(&self, target_date: NaiveDate, ctx: &StepContext) -> StepOutcome {
        let dataset = self.adapter.dataset();

        if !dataset.supports_historical() && target_date != ctx.market_date {
            tracing::info!(
                "Skipping {}: live-only dataset cannot be fetched for {}",
                dataset,
                target_date
            );
            return StepOutcome::skipped(
                dataset,
                format!("live-only dataset cannot be fetched for past date {}", target_date),
            );
        }

        let (attempts, fetched) = self.fetch_with_retry(target_date, ctx.retry).await;
        let rows = match fetched {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("Fetch {} failed after {} attempt(s): {}", dataset, attempts, e);
                return StepOutcome::failed(dataset, attempts, e.to_string());
            }
        };

        if rows.is_empty() {
            tracing::info!(
                "No {} rows for {}, existing snapshot kept",
                dataset.label(),
                target_date
            );
            return StepOutcome {
                dataset,
                status: StepStatus::Empty,
                rows: 0,
                attempts,
                error: None,
                note: Some("provider returned no rows".to_string()),
            };
        }

        let partition = self.adapter.partition(target_date);
        match with_db(&ctx.db, move |db| db.replace_snapshot(&partition, &rows)).await {
            Ok(outcome) => {
                let saved = outcome.saved();
                tracing::info!("Saved {} {} rows for {}", saved, dataset.label(), target_date);
                StepOutcome {
                    dataset,
                    status: StepStatus::Saved,
                    rows: saved,
                    attempts,
                    error: None,
                    note: None,
                }
            }
            Err(e) => {
                tracing::error!("Store {} failed, partition rolled back: {}", dataset, e);
                StepOutcome::failed(dataset, attempts, store_error(e))
            }
        }
    }

    async fn fetch_preview(
        &self,
        as_of: NaiveDate,
        retry: RetryPolicy,
    ) -> Result<Vec<serde_json::Value>> {
        let (_, rows) = self.fetch_with_retry(as_of, retry).await;
        rows?
            .iter()
            .map(|row| serde_json::to_value(row).map_err(AppError::from))
            .collect()
    }
}

fn store_error(e: AppError) -> String {
    format!("store: {}", e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{IndexQuoteAdapter, ZtPoolAdapter};
    use crate::db::sqlite::models::LimitUpStock;
    use crate::db::sqlite::Partition;
    use crate::provider::mock::MockProvider;
    use serde_json::json;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn context(market_date: NaiveDate) -> (TempDir, StepContext) {
        let dir = tempfile::tempdir().unwrap();
        let db = SqliteDb::new(&dir.path().join("test.db"), 2).unwrap();
        let ctx = StepContext {
            db: Arc::new(db),
            retry: RetryPolicy::new(3, Duration::from_millis(1)),
            market_date,
        };
        (dir, ctx)
    }

    fn zt_rows(n: usize) -> Vec<serde_json::Value> {
        (1..=n)
            .map(|i| json!({"序号": i, "代码": format!("{:06}", i), "名称": format!("股票{}", i)}))
            .collect()
    }

    #[test]
    fn test_backoff_doubles() {
        let retry = RetryPolicy::new(3, Duration::from_millis(1000));
        assert_eq!(retry.delay_after(1), Duration::from_millis(1000));
        assert_eq!(retry.delay_after(2), Duration::from_millis(2000));
        assert_eq!(retry.delay_after(3), Duration::from_millis(4000));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_saves_rows() {
        let d = date("2025-06-10");
        let (_dir, ctx) = context(d);
        let provider = MockProvider::new().with_rows("stock_zt_pool_em", zt_rows(5));
        let step = DatasetSyncStep::new(ZtPoolAdapter::new(Arc::new(provider)));

        let outcome = step.run(d, &ctx).await;
        assert_eq!(outcome.status, StepStatus::Saved);
        assert_eq!(outcome.rows, 5);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(ctx.db.count_snapshot::<LimitUpStock>(&Partition::new(d)).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_retries_then_fails() {
        let d = date("2025-06-10");
        let (_dir, ctx) = context(d);
        let provider = Arc::new(
            MockProvider::new().with_failure("stock_zh_index_spot_em", "502 Bad Gateway"),
        );
        let step = DatasetSyncStep::new(IndexQuoteAdapter::new(provider.clone()));

        let outcome = step.run(d, &ctx).await;
        assert_eq!(outcome.status, StepStatus::Failed);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(provider.call_count("stock_zh_index_spot_em"), 3);
        assert!(outcome.error.unwrap().contains("502"));
    }

    #[tokio::test]
    async fn test_transient_failures_recover_on_retry() {
        let d = date("2025-06-10");
        let (_dir, ctx) = context(d);
        let provider = Arc::new(MockProvider::new().with_failures_then_rows(
            "stock_zt_pool_em",
            2,
            zt_rows(4),
        ));
        let step = DatasetSyncStep::new(ZtPoolAdapter::new(provider.clone()));

        let outcome = step.run(d, &ctx).await;
        assert_eq!(outcome.status, StepStatus::Saved);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.rows, 4);
        assert!(outcome.error.is_none());
        assert_eq!(provider.call_count("stock_zt_pool_em"), 3);
        assert_eq!(ctx.db.count_snapshot::<LimitUpStock>(&Partition::new(d)).unwrap(), 4);
    }

    #[tokio::test]
    async fn test_empty_fetch_keeps_partition() {
        let d = date("2025-06-10");
        let (_dir, ctx) = context(d);

        let full = DatasetSyncStep::new(ZtPoolAdapter::new(Arc::new(
            MockProvider::new().with_rows("stock_zt_pool_em", zt_rows(3)),
        )));
        full.run(d, &ctx).await;

        let empty = DatasetSyncStep::new(ZtPoolAdapter::new(Arc::new(MockProvider::new())));
        let outcome = empty.run(d, &ctx).await;
        assert_eq!(outcome.status, StepStatus::Empty);
        assert_eq!(outcome.rows, 0);
        assert_eq!(ctx.db.count_snapshot::<LimitUpStock>(&Partition::new(d)).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_live_only_dataset_skipped_for_past_date() {
        let (_dir, ctx) = context(date("2025-06-10"));
        let provider = Arc::new(MockProvider::new());
        let step = DatasetSyncStep::new(IndexQuoteAdapter::new(provider.clone()));

        let outcome = step.run(date("2025-06-09"), &ctx).await;
        assert_eq!(outcome.status, StepStatus::Skipped);
        assert_eq!(provider.call_count("stock_zh_index_spot_em"), 0);
        assert!(outcome.error.is_none());
        assert!(outcome.note.unwrap().contains("live-only"));

        let result = step.run(date("2025-06-09"), &ctx).await.to_result();
        assert!(result.error.is_none());
        assert!(result.note.is_some());
    }

    #[tokio::test]
    async fn test_store_error_is_failure() {
        let d = date("2025-06-10");
        let (_dir, ctx) = context(d);
        // Duplicate ranks violate the partition's unique key
        let rows = vec![
            json!({"序号": 1, "代码": "000001", "名称": "A"}),
            json!({"序号": 1, "代码": "000002", "名称": "B"}),
        ];
        let provider = MockProvider::new().with_rows("stock_zt_pool_em", rows);
        let step = DatasetSyncStep::new(ZtPoolAdapter::new(Arc::new(provider)));

        let outcome = step.run(d, &ctx).await;
        assert_eq!(outcome.status, StepStatus::Failed);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.error.unwrap().starts_with("store:"));
        assert_eq!(ctx.db.count_snapshot::<LimitUpStock>(&Partition::new(d)).unwrap(), 0);
    }
}
