//! Control API request and response types

use crate::error::{AppError, ErrorResponse};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Standard API response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success_with_message(message: &str) -> Self {
        Self {
            status: "success".to_string(),
            code: None,
            message: Some(message.to_string()),
            data: None,
        }
    }

    pub fn success_with_data(data: T) -> Self {
        Self {
            status: "success".to_string(),
            code: None,
            message: None,
            data: Some(data),
        }
    }

    pub fn error(err: &AppError) -> Self {
        let response = ErrorResponse::from(err);
        Self {
            status: "error".to_string(),
            code: Some(response.code),
            message: Some(response.message),
            data: None,
        }
    }
}

/// Placeholder payload for responses without data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Empty {}

/// Health check payload
#[derive(Debug, Clone, Serialize)]
pub struct HealthData {
    pub uptime_secs: i64,
    pub scheduler_running: bool,
}

/// Scheduler status payload
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerData {
    pub running: bool,
    pub jobs: Vec<crate::scheduler::JobStatus>,
}

/// Body of `PUT /jobs/:job_id`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateJobRequest {
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub timezone: Option<String>,
    pub enabled: Option<bool>,
}

/// Query of `GET /snapshots/:dataset`: either `date` or `start` and `end`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotQuery {
    pub date: Option<NaiveDate>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Query of `GET /snapshots/:dataset/count`
#[derive(Debug, Clone, Deserialize)]
pub struct PartitionQuery {
    pub date: NaiveDate,
}

/// Query of `GET /calendar`
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Trading days of a date range
#[derive(Debug, Clone, Serialize)]
pub struct CalendarData {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub trading_days: Vec<NaiveDate>,
}

/// Result of `POST /calendar/refresh`
#[derive(Debug, Clone, Serialize)]
pub struct CalendarRefreshData {
    pub dates: usize,
}

/// Body of `POST /jobs/:job_id/run`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunJobRequest {
    /// Target trading date, defaults to today in the market timezone
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub force: bool,
}
