//! Control API endpoint handlers

use crate::control::types::*;
use crate::dataset::Dataset;
use crate::db::sqlite::models::{ExecutionRecord, SyncJobConfig};
use crate::db::sqlite::LedgerStats;
use crate::error::AppError;
use crate::scheduler::{JobStatus, JobUpdate};
use crate::services::{
    ExecutionQuery, LedgerService, RealtimeSnapshot, RefreshResult, SnapshotResult,
    SnapshotService,
};
use crate::state::AppState;
use crate::sync::RunReport;
use axum::{
    body::Bytes,
    extract::{Json, Path, Query, State as AxumState},
    http::StatusCode,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    (StatusCode::OK, Json(ApiResponse::success_with_data(data)))
}

fn error_response<T: Serialize>(e: AppError) -> ApiResult<T> {
    let status = match &e {
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::Scheduler(_) => StatusCode::CONFLICT,
        _ => {
            error!("Control API error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ApiResponse::error(&e)))
}

fn respond<T: Serialize>(result: crate::error::Result<T>) -> ApiResult<T> {
    match result {
        Ok(data) => ok(data),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Health Check
// ============================================================================

/// Health check endpoint - GET /health
pub async fn health_check(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<HealthData> {
    ok(HealthData {
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        scheduler_running: state.scheduler.is_running(),
    })
}

// ============================================================================
// Scheduler
// ============================================================================

/// GET /scheduler
pub async fn scheduler_status(
    AxumState(state): AxumState<Arc<AppState>>,
) -> ApiResult<SchedulerData> {
    respond(state.scheduler.list_jobs().await.map(|jobs| SchedulerData {
        running: state.scheduler.is_running(),
        jobs,
    }))
}

/// POST /scheduler/start
pub async fn start_scheduler(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<Empty> {
    match state.scheduler.start().await {
        Ok(true) => (StatusCode::OK, Json(ApiResponse::success_with_message("Scheduler started"))),
        Ok(false) => (
            StatusCode::OK,
            Json(ApiResponse::success_with_message("Scheduler already running")),
        ),
        Err(e) => error_response(e),
    }
}

/// POST /scheduler/stop
///
/// Returns once in-flight runs have finished.
pub async fn stop_scheduler(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<Empty> {
    let message = if state.scheduler.stop().await {
        "Scheduler stopped"
    } else {
        "Scheduler not running"
    };
    (StatusCode::OK, Json(ApiResponse::success_with_message(message)))
}

// ============================================================================
// Jobs
// ============================================================================

/// GET /jobs
pub async fn list_jobs(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<Vec<JobStatus>> {
    respond(state.scheduler.list_jobs().await)
}

/// PUT /jobs/:job_id
pub async fn update_job(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(job_id): Path<String>,
    Json(request): Json<UpdateJobRequest>,
) -> ApiResult<SyncJobConfig> {
    info!("Updating job {}: {:?}", job_id, request);
    let update = JobUpdate {
        hour: request.hour,
        minute: request.minute,
        timezone: request.timezone,
        enabled: request.enabled,
    };
    respond(state.scheduler.update_job(&job_id, update).await)
}

/// POST /jobs/:job_id/run
///
/// The body is optional; a body that is present must parse.
pub async fn run_job(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(job_id): Path<String>,
    body: Bytes,
) -> ApiResult<RunReport> {
    let request = match parse_run_request(&body) {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };
    info!("Force-run of {} requested (date={:?}, force={})", job_id, request.date, request.force);
    respond(state.scheduler.run_now(&job_id, request.date, request.force).await)
}

fn parse_run_request(body: &[u8]) -> crate::error::Result<RunJobRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunJobRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid run request body: {}", e)))
}

// ============================================================================
// Executions
// ============================================================================

/// GET /executions?date= | ?job_id=&limit= | ?start=&end=
pub async fn list_executions(
    AxumState(state): AxumState<Arc<AppState>>,
    Query(query): Query<ExecutionQuery>,
) -> ApiResult<Vec<ExecutionRecord>> {
    respond(LedgerService::query(&state, query).await)
}

/// GET /executions/stats
pub async fn execution_stats(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<LedgerStats> {
    respond(LedgerService::stats(&state).await)
}

// ============================================================================
// Snapshots
// ============================================================================

/// GET /snapshots/:dataset?date= | ?start=&end=
pub async fn get_snapshots(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(dataset): Path<String>,
    Query(query): Query<SnapshotQuery>,
) -> ApiResult<SnapshotResult> {
    let dataset = match dataset.parse::<Dataset>() {
        Ok(dataset) => dataset,
        Err(e) => return error_response(e),
    };

    let result = match query {
        SnapshotQuery { date: Some(date), .. } => {
            SnapshotService::get_snapshot(&state, dataset, date).await
        }
        SnapshotQuery {
            start: Some(start),
            end: Some(end),
            ..
        } => SnapshotService::get_snapshots_between(&state, dataset, start, end).await,
        _ => Err(AppError::Validation(
            "either date or start and end are required".to_string(),
        )),
    };
    respond(result)
}

/// GET /snapshots/:dataset/dates
pub async fn list_snapshot_dates(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(dataset): Path<String>,
) -> ApiResult<Vec<NaiveDate>> {
    match dataset.parse::<Dataset>() {
        Ok(dataset) => respond(SnapshotService::list_dates(&state, dataset).await),
        Err(e) => error_response(e),
    }
}

/// GET /snapshots/:dataset/count?date=
pub async fn partition_count(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(dataset): Path<String>,
    Query(query): Query<PartitionQuery>,
) -> ApiResult<i64> {
    match dataset.parse::<Dataset>() {
        Ok(dataset) => respond(SnapshotService::partition_count(&state, dataset, query.date).await),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Trading calendar
// ============================================================================

/// GET /calendar?start=&end=
pub async fn trading_days(
    AxumState(state): AxumState<Arc<AppState>>,
    Query(query): Query<CalendarQuery>,
) -> ApiResult<CalendarData> {
    let CalendarQuery { start, end } = query;
    respond(
        state
            .calendar
            .trading_days_between(start, end)
            .await
            .map(|trading_days| CalendarData {
                start,
                end,
                trading_days,
            }),
    )
}

/// POST /calendar/refresh
pub async fn refresh_calendar(
    AxumState(state): AxumState<Arc<AppState>>,
) -> ApiResult<CalendarRefreshData> {
    respond(
        state
            .calendar
            .refresh()
            .await
            .map(|dates| CalendarRefreshData { dates }),
    )
}

// ============================================================================
// Realtime
// ============================================================================

/// POST /realtime/refresh
pub async fn refresh_realtime(
    AxumState(state): AxumState<Arc<AppState>>,
) -> ApiResult<Vec<RefreshResult>> {
    ok(state.realtime.refresh().await)
}

/// GET /realtime/:dataset
pub async fn get_realtime(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(dataset): Path<String>,
) -> ApiResult<RealtimeSnapshot> {
    respond(
        dataset
            .parse::<Dataset>()
            .and_then(|dataset| state.realtime.get(dataset)),
    )
}
