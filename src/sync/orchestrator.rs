//! Sync run orchestration
//!
//! One run: gate on the trading calendar, run the requested dataset steps
//! over a bounded worker pool, then append exactly one ledger row.

use super::registry::StepRegistry;
use super::step::{RetryPolicy, StepContext, StepOutcome, StepStatus};
use crate::calendar::TradingCalendar;
use crate::dataset::Dataset;
use crate::db::sqlite::models::{ExecutionStatus, NewExecutionRecord, RunTrigger};
use crate::db::sqlite::SqliteDb;
use crate::db::with_db;
use crate::error::Result;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use chrono_tz::Tz;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Source of the current instant
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A request to sync a set of datasets
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub job_id: String,
    /// Defaults to the current market date
    pub target_date: Option<NaiveDate>,
    pub datasets: Vec<Dataset>,
    /// Run even when the target date is not a trading day
    pub forced: bool,
    pub trigger: RunTrigger,
}

impl RunRequest {
    pub fn scheduled(job_id: &str, datasets: Vec<Dataset>) -> Self {
        Self {
            job_id: job_id.to_string(),
            target_date: None,
            datasets,
            forced: false,
            trigger: RunTrigger::Scheduled,
        }
    }

    pub fn manual(
        job_id: &str,
        datasets: Vec<Dataset>,
        target_date: Option<NaiveDate>,
        forced: bool,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            target_date,
            datasets,
            forced,
            trigger: RunTrigger::Manual,
        }
    }
}

/// Overall result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Not a trading day; no dataset was attempted
    Skipped,
    Success,
    /// At least one attempted dataset failed, but not all of them
    PartialFailure,
    /// Every attempted dataset failed
    Failed,
}

impl RunOutcome {
    /// Classify finished steps: failed only when every attempted step failed.
    ///
    /// Skipped steps were never attempted and do not count either way.
    pub fn from_steps(steps: &[StepOutcome]) -> Self {
        let attempted = steps.iter().filter(|s| s.status != StepStatus::Skipped).count();
        let failed = steps.iter().filter(|s| s.is_failed()).count();
        if failed == 0 {
            RunOutcome::Success
        } else if failed == attempted {
            RunOutcome::Failed
        } else {
            RunOutcome::PartialFailure
        }
    }

    /// Status written to the ledger
    pub fn ledger_status(&self) -> ExecutionStatus {
        match self {
            RunOutcome::Skipped => ExecutionStatus::Skipped,
            RunOutcome::Success | RunOutcome::PartialFailure => ExecutionStatus::Success,
            RunOutcome::Failed => ExecutionStatus::Failed,
        }
    }
}

/// Summary returned to the caller of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub ledger_id: i64,
    pub run_id: String,
    pub job_id: String,
    pub target_date: NaiveDate,
    pub is_trading_day: bool,
    pub outcome: RunOutcome,
    pub steps: Vec<StepOutcome>,
    pub duration_ms: i64,
}

impl RunReport {
    pub fn rows_for(&self, dataset: Dataset) -> usize {
        self.steps
            .iter()
            .find(|s| s.dataset == dataset)
            .map_or(0, |s| s.rows)
    }
}

/// Runs sync requests against the registry
pub struct Orchestrator {
    db: Arc<SqliteDb>,
    calendar: Arc<TradingCalendar>,
    registry: Arc<StepRegistry>,
    retry: RetryPolicy,
    workers: usize,
    market_tz: Tz,
    clock: Clock,
}

impl Orchestrator {
    pub fn new(
        db: Arc<SqliteDb>,
        calendar: Arc<TradingCalendar>,
        registry: Arc<StepRegistry>,
        retry: RetryPolicy,
        workers: usize,
        market_tz: Tz,
    ) -> Self {
        Self {
            db,
            calendar,
            registry,
            retry,
            workers: workers.max(1),
            market_tz,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Current date in the market timezone
    pub fn market_date(&self) -> NaiveDate {
        (self.clock)().with_timezone(&self.market_tz).date_naive()
    }

    /// Execute one run and record it in the ledger.
    ///
    /// Errors are only returned when the ledger row itself cannot be written.
    pub async fn run(&self, request: RunRequest) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let market_date = self.market_date();
        let target_date = request.target_date.unwrap_or(market_date);

        let span = tracing::info_span!(
            "sync_run",
            job_id = %request.job_id,
            run_id = %run_id,
            date = %target_date
        );

        self.execute(request, run_id, market_date, target_date)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        request: RunRequest,
        run_id: String,
        market_date: NaiveDate,
        target_date: NaiveDate,
    ) -> Result<RunReport> {
        let started = Instant::now();
        let execution_time = (self.clock)()
            .with_timezone(&self.market_tz)
            .to_rfc3339_opts(SecondsFormat::Secs, false);

        tracing::info!(
            "Sync run started ({}, {} datasets{})",
            request.trigger.as_str(),
            request.datasets.len(),
            if request.forced { ", forced" } else { "" }
        );

        let is_trading_day = self.calendar.is_trading_day(target_date).await;

        let (outcome, steps) = if !is_trading_day && !request.forced {
            tracing::info!("{} is not a trading day, skipping", target_date);
            (RunOutcome::Skipped, Vec::new())
        } else {
            let steps = self.run_steps(&request.datasets, market_date, target_date).await;
            (RunOutcome::from_steps(&steps), steps)
        };

        let duration_ms = started.elapsed().as_millis() as i64;
        let record = NewExecutionRecord {
            run_id: run_id.clone(),
            job_id: request.job_id.clone(),
            execution_date: target_date,
            execution_time,
            status: outcome.ledger_status(),
            trigger: request.trigger,
            forced: request.forced,
            duration_ms,
            is_trading_day,
            dataset_counts: steps
                .iter()
                .map(|s| (s.dataset, s.rows))
                .collect::<BTreeMap<_, _>>(),
            dataset_results: steps.iter().map(StepOutcome::to_result).collect(),
            error_message: error_message(&steps),
            error_stack: error_details(&steps),
            notes: Some(run_notes(outcome, &steps, target_date, is_trading_day, request.forced)),
        };

        let ledger_id = match with_db(&self.db, move |db| db.record_execution(&record)).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Failed to record sync run {} in ledger: {}", run_id, e);
                return Err(e);
            }
        };

        match outcome {
            RunOutcome::Failed => {
                tracing::error!("Sync run failed: every dataset failed ({} ms)", duration_ms)
            }
            RunOutcome::PartialFailure => {
                tracing::warn!("Sync run finished with failures ({} ms)", duration_ms)
            }
            _ => tracing::info!("Sync run finished: {:?} ({} ms)", outcome, duration_ms),
        }

        Ok(RunReport {
            ledger_id,
            run_id,
            job_id: request.job_id,
            target_date,
            is_trading_day,
            outcome,
            steps,
            duration_ms,
        })
    }

    /// Run steps over a bounded pool; a panicking step fails only its dataset
    async fn run_steps(
        &self,
        datasets: &[Dataset],
        market_date: NaiveDate,
        target_date: NaiveDate,
    ) -> Vec<StepOutcome> {
        let ctx = Arc::new(StepContext {
            db: self.db.clone(),
            retry: self.retry,
            market_date,
        });

        // Spawning is deferred until the pool polls each task
        let tasks: Vec<_> = self
            .registry
            .steps_for(datasets)
            .into_iter()
            .map(|step| {
                let ctx = ctx.clone();
                let dataset = step.dataset();
                let span = tracing::Span::current();
                async move {
                    let handle = tokio::spawn(
                        async move { step.run(target_date, &ctx).await }.instrument(span),
                    );
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::error!("Step {} aborted: {}", dataset, e);
                            StepOutcome::failed(dataset, 1, format!("step aborted: {}", e))
                        }
                    }
                }
            })
            .collect();

        let mut outcomes: Vec<StepOutcome> = stream::iter(tasks)
            .buffer_unordered(self.workers)
            .collect()
            .await;

        outcomes.sort_by_key(|o| o.dataset);
        outcomes
    }
}

fn error_message(steps: &[StepOutcome]) -> Option<String> {
    let failed: Vec<String> = steps
        .iter()
        .filter(|s| s.is_failed())
        .map(|s| format!("{}: {}", s.dataset, s.error.as_deref().unwrap_or("unknown error")))
        .collect();

    (!failed.is_empty()).then(|| failed.join("; "))
}

fn error_details(steps: &[StepOutcome]) -> Option<String> {
    let details: Vec<String> = steps
        .iter()
        .filter(|s| s.is_failed())
        .map(|s| {
            format!(
                "[{}] after {} attempt(s)\n{}",
                s.dataset,
                s.attempts,
                s.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();

    (!details.is_empty()).then(|| details.join("\n\n"))
}

fn run_notes(
    outcome: RunOutcome,
    steps: &[StepOutcome],
    target_date: NaiveDate,
    is_trading_day: bool,
    forced: bool,
) -> String {
    if outcome == RunOutcome::Skipped {
        return format!("{} is not a trading day", target_date);
    }

    let count = |status: StepStatus| steps.iter().filter(|s| s.status == status).count();
    let mut notes = format!(
        "{} saved, {} empty, {} skipped, {} failed",
        count(StepStatus::Saved),
        count(StepStatus::Empty),
        count(StepStatus::Skipped),
        count(StepStatus::Failed)
    );

    if outcome == RunOutcome::PartialFailure {
        let failed: Vec<&str> = steps
            .iter()
            .filter(|s| s.is_failed())
            .map(|s| s.dataset.as_str())
            .collect();
        notes.push_str(&format!("; partial failure: {}", failed.join(", ")));
    }
    if forced && !is_trading_day {
        notes.push_str("; forced on non-trading day");
    }
    notes
}
