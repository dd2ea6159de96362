//! Sync job schedule management

use super::models::SyncJobConfig;
use crate::dataset::Dataset;
use crate::error::{AppError, Result};
use rusqlite::{params, Connection, Row};

const SELECT_JOB: &str =
    "SELECT job_id, name, hour, minute, timezone, datasets, enabled FROM sync_jobs";

/// Get all configured jobs
pub fn get_jobs(conn: &Connection) -> Result<Vec<SyncJobConfig>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY hour, minute, job_id", SELECT_JOB))?;

    let jobs = stmt
        .query_map([], map_job)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(jobs)
}

/// Get one job by id
pub fn get_job(conn: &Connection, job_id: &str) -> Result<Option<SyncJobConfig>> {
    let result = conn.query_row(
        &format!("{} WHERE job_id = ?1", SELECT_JOB),
        params![job_id],
        map_job,
    );

    match result {
        Ok(job) => Ok(Some(job)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Update the schedule of a job
pub fn update_job(
    conn: &Connection,
    job_id: &str,
    hour: Option<u32>,
    minute: Option<u32>,
    timezone: Option<String>,
    enabled: Option<bool>,
) -> Result<SyncJobConfig> {
    let mut updates = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(h) = hour {
        if h > 23 {
            return Err(AppError::Validation(format!("hour out of range: {}", h)));
        }
        updates.push("hour = ?");
        params.push(Box::new(h));
    }
    if let Some(m) = minute {
        if m > 59 {
            return Err(AppError::Validation(format!("minute out of range: {}", m)));
        }
        updates.push("minute = ?");
        params.push(Box::new(m));
    }
    if let Some(tz) = timezone {
        crate::config::parse_timezone(&tz)
            .map_err(|_| AppError::Validation(format!("Unknown timezone: {}", tz)))?;
        updates.push("timezone = ?");
        params.push(Box::new(tz));
    }
    if let Some(e) = enabled {
        updates.push("enabled = ?");
        params.push(Box::new(e as i32));
    }

    if !updates.is_empty() {
        updates.push("updated_at = datetime('now')");
        params.push(Box::new(job_id.to_string()));

        let sql = format!("UPDATE sync_jobs SET {} WHERE job_id = ?", updates.join(", "));
        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;
    }

    get_job(conn, job_id)?.ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))
}

fn map_job(row: &Row<'_>) -> rusqlite::Result<SyncJobConfig> {
    let datasets: String = row.get(5)?;
    let datasets = serde_json::from_str::<Vec<Dataset>>(&datasets).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(SyncJobConfig {
        job_id: row.get(0)?,
        name: row.get(1)?,
        hour: row.get(2)?,
        minute: row.get(3)?,
        timezone: row.get(4)?,
        datasets,
        enabled: row.get::<_, i32>(6)? == 1,
    })
}
