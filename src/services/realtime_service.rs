//! Realtime Service
//!
//! Intraday refresh of every dataset for the current market date. Results
//! are cached in memory only; the snapshot store is never written here.

use crate::dataset::Dataset;
use crate::error::{AppError, Result};
use crate::sync::{RetryPolicy, StepRegistry};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Latest fetched records of one dataset
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeSnapshot {
    pub dataset: Dataset,
    pub market_date: NaiveDate,
    pub fetched_at: DateTime<Utc>,
    pub count: usize,
    pub rows: Vec<serde_json::Value>,
}

/// Per-dataset result of a refresh
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResult {
    pub dataset: Dataset,
    pub success: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Realtime refresh service with an in-memory cache
pub struct RealtimeService {
    registry: Arc<StepRegistry>,
    retry: RetryPolicy,
    workers: usize,
    market_tz: Tz,
    cache: DashMap<Dataset, RealtimeSnapshot>,
}

impl RealtimeService {
    pub fn new(
        registry: Arc<StepRegistry>,
        retry: RetryPolicy,
        workers: usize,
        market_tz: Tz,
    ) -> Self {
        Self {
            registry,
            retry,
            workers: workers.max(1),
            market_tz,
            cache: DashMap::new(),
        }
    }

    /// Fetch every dataset concurrently and update the cache.
    ///
    /// A failed dataset keeps its previously cached snapshot.
    pub async fn refresh(&self) -> Vec<RefreshResult> {
        let market_date = Utc::now().with_timezone(&self.market_tz).date_naive();
        info!(
            "RealtimeService::refresh - {} datasets for {}",
            Dataset::ALL.len(),
            market_date
        );

        let retry = self.retry;
        let tasks: Vec<_> = self
            .registry
            .steps_for(&Dataset::ALL)
            .into_iter()
            .map(|step| async move {
                let dataset = step.dataset();
                match step.fetch_preview(market_date, retry).await {
                    Ok(rows) => {
                        let count = rows.len();
                        self.cache.insert(
                            dataset,
                            RealtimeSnapshot {
                                dataset,
                                market_date,
                                fetched_at: Utc::now(),
                                count,
                                rows,
                            },
                        );
                        RefreshResult {
                            dataset,
                            success: true,
                            count,
                            error: None,
                        }
                    }
                    Err(e) => {
                        warn!("Realtime refresh of {} failed: {}", dataset, e);
                        RefreshResult {
                            dataset,
                            success: false,
                            count: 0,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect();

        let mut results: Vec<RefreshResult> = stream::iter(tasks)
            .buffer_unordered(self.workers)
            .collect()
            .await;

        results.sort_by_key(|r| r.dataset);
        results
    }

    /// Cached snapshot of a dataset
    pub fn get(&self, dataset: Dataset) -> Result<RealtimeSnapshot> {
        self.cache
            .get(&dataset)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("No realtime data cached for {}", dataset)))
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
