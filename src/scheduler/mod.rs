//! Job scheduler
//!
//! Fires sync jobs at their configured local time. The scheduler is a pure
//! timer: all sync semantics live in the orchestrator.
//! - One tokio task per enabled job sleeps until the next trigger
//! - `stop()` prevents further triggers and waits for in-flight runs

mod timing;

pub use timing::{duration_until, next_fire_time};

use crate::config::parse_timezone;
use crate::db::sqlite::models::SyncJobConfig;
use crate::db::sqlite::SqliteDb;
use crate::db::with_db;
use crate::error::{AppError, Result};
use crate::sync::{Orchestrator, RunReport, RunRequest};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashSet;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Job configuration with its next trigger
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    #[serde(flatten)]
    pub config: SyncJobConfig,
    pub next_run: Option<DateTime<Utc>>,
    pub running: bool,
}

/// Field changes accepted by [`SyncScheduler::update_job`]
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub timezone: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Default)]
struct Timers {
    shutdown: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

/// Jobs with a run in progress; wakes `stop()` when the set drains
#[derive(Default)]
struct ActiveRuns {
    jobs: DashSet<String>,
    idle: Notify,
}

/// Removes a job from the active set when the run ends, even on panic
struct ActiveRunGuard {
    active: Arc<ActiveRuns>,
    job_id: String,
}

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        self.active.jobs.remove(&self.job_id);
        if self.active.jobs.is_empty() {
            self.active.idle.notify_waiters();
        }
    }
}

impl ActiveRuns {
    fn begin(self: &Arc<Self>, job_id: &str) -> Result<ActiveRunGuard> {
        if !self.jobs.insert(job_id.to_string()) {
            return Err(AppError::Scheduler(format!("Job {} is already running", job_id)));
        }
        Ok(ActiveRunGuard {
            active: self.clone(),
            job_id: job_id.to_string(),
        })
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.jobs.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

/// Scheduler owning one timer task per enabled job
pub struct SyncScheduler {
    db: Arc<SqliteDb>,
    orchestrator: Arc<Orchestrator>,
    timers: Mutex<Timers>,
    active: Arc<ActiveRuns>,
}

impl SyncScheduler {
    pub fn new(db: Arc<SqliteDb>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            db,
            orchestrator,
            timers: Mutex::new(Timers::default()),
            active: Arc::new(ActiveRuns::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.timers.lock().shutdown.is_some()
    }

    /// Start timers for every enabled job. Returns `false` if already running.
    pub async fn start(&self) -> Result<bool> {
        if self.is_running() {
            info!("Scheduler already running");
            return Ok(false);
        }

        let jobs = with_db(&self.db, |db| db.get_jobs()).await?;
        let mut timers = self.timers.lock();
        if timers.shutdown.is_some() {
            return Ok(false);
        }
        *timers = self.spawn_timers(jobs);

        info!("Scheduler started with {} timer(s)", timers.handles.len());
        Ok(true)
    }

    /// Stop triggering and wait for in-flight runs. Returns `false` if not running.
    pub async fn stop(&self) -> bool {
        let timers = std::mem::take(&mut *self.timers.lock());
        let Some(shutdown) = timers.shutdown else {
            return false;
        };

        let _ = shutdown.send(true);
        for handle in timers.handles {
            if let Err(e) = handle.await {
                warn!("Scheduler timer ended abnormally: {}", e);
            }
        }
        self.active.wait_idle().await;

        info!("Scheduler stopped");
        true
    }

    /// Configured jobs with their next trigger time
    pub async fn list_jobs(&self) -> Result<Vec<JobStatus>> {
        let jobs = with_db(&self.db, |db| db.get_jobs()).await?;
        let now = Utc::now();
        let running = self.is_running();

        Ok(jobs
            .into_iter()
            .map(|config| {
                let next_run = if running && config.enabled {
                    job_next_fire(&config, now)
                } else {
                    None
                };
                let active = self.active.jobs.contains(&config.job_id);
                JobStatus {
                    config,
                    next_run,
                    running: active,
                }
            })
            .collect())
    }

    /// Run a job immediately, outside its schedule
    pub async fn run_now(
        &self,
        job_id: &str,
        target_date: Option<NaiveDate>,
        force: bool,
    ) -> Result<RunReport> {
        let lookup = job_id.to_string();
        let job = with_db(&self.db, move |db| db.get_job(&lookup))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

        let _guard = self.active.begin(&job.job_id)?;
        info!("Manual run of {} requested", job.job_id);

        let request = RunRequest::manual(&job.job_id, job.datasets, target_date, force);
        self.orchestrator.run(request).await
    }

    /// Persist a schedule change; running timers pick it up immediately
    pub async fn update_job(&self, job_id: &str, update: JobUpdate) -> Result<SyncJobConfig> {
        let id = job_id.to_string();
        let config = with_db(&self.db, move |db| {
            db.update_job(&id, update.hour, update.minute, update.timezone, update.enabled)
        })
        .await?;

        if self.is_running() {
            let jobs = with_db(&self.db, |db| db.get_jobs()).await?;
            let mut timers = self.timers.lock();
            if let Some(old) = timers.shutdown.take() {
                // Old timers finish any run in progress, then exit
                let _ = old.send(true);
                *timers = self.spawn_timers(jobs);
                info!("Scheduler timers restarted after update of {}", job_id);
            }
        }

        Ok(config)
    }

    fn spawn_timers(&self, jobs: Vec<SyncJobConfig>) -> Timers {
        let (tx, rx) = watch::channel(false);
        let handles = jobs
            .into_iter()
            .filter(|job| job.enabled)
            .map(|job| {
                let orchestrator = self.orchestrator.clone();
                let active = self.active.clone();
                let shutdown = rx.clone();
                tokio::spawn(run_timer(job, orchestrator, active, shutdown))
            })
            .collect();

        Timers {
            shutdown: Some(tx),
            handles,
        }
    }
}

fn job_next_fire(job: &SyncJobConfig, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let tz = parse_timezone(&job.timezone).ok()?;
    next_fire_time(now, job.hour, job.minute, tz)
}

async fn run_timer(
    job: SyncJobConfig,
    orchestrator: Arc<Orchestrator>,
    active: Arc<ActiveRuns>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let now = Utc::now();
        let Some(fire_at) = job_next_fire(&job, now) else {
            error!(
                "Job {} has an invalid schedule {:02}:{:02} {}, timer not started",
                job.job_id, job.hour, job.minute, job.timezone
            );
            return;
        };

        let wait = duration_until(now, fire_at);
        info!(
            "Next run of {} in {} hours {} minutes",
            job.job_id,
            wait.as_secs() / 3600,
            (wait.as_secs() % 3600) / 60
        );

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => return,
        }
        if *shutdown.borrow() {
            return;
        }

        let _guard = match active.begin(&job.job_id) {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Skipping scheduled trigger: {}", e);
                continue;
            }
        };

        let request = RunRequest::scheduled(&job.job_id, job.datasets.clone());
        if let Err(e) = orchestrator.run(request).await {
            error!("Scheduled run of {} could not be recorded: {}", job.job_id, e);
        }
    }
}
