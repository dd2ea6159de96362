//! Job execution ledger
//!
//! Append-only audit trail of orchestration runs. Every run writes exactly
//! one row; rows are never updated or deleted by normal operation. Counts
//! are denormalized so the ledger stays readable after snapshot data is
//! purged.

use super::models::{DatasetResult, ExecutionRecord, ExecutionStatus, NewExecutionRecord};
use crate::dataset::Dataset;
use crate::error::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

const SELECT_COLUMNS: &str = r#"
    SELECT id, run_id, job_id, execution_date, execution_time, status, trigger_source, forced,
           duration_ms, is_trading_day, industry_count, concept_count, zt_pool_count,
           dt_pool_count, zb_pool_count, index_count, dataset_results, error_message,
           error_stack, notes, created_at
    FROM job_execution_logs
"#;

/// Append a ledger entry and return its id
pub fn create_log(conn: &Connection, record: &NewExecutionRecord) -> Result<i64> {
    let count = |dataset: Dataset| -> i64 {
        record.dataset_counts.get(&dataset).copied().unwrap_or(0) as i64
    };
    let dataset_results = serde_json::to_string(&record.dataset_results)?;

    conn.execute(
        r#"
        INSERT INTO job_execution_logs (
            run_id, job_id, execution_date, execution_time, status, trigger_source, forced,
            duration_ms, is_trading_day, industry_count, concept_count, zt_pool_count,
            dt_pool_count, zb_pool_count, index_count, dataset_results, error_message,
            error_stack, notes
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
        "#,
        params![
            record.run_id,
            record.job_id,
            record.execution_date,
            record.execution_time,
            record.status.as_str(),
            record.trigger.as_str(),
            record.forced,
            record.duration_ms,
            record.is_trading_day,
            count(Dataset::IndustrySector),
            count(Dataset::ConceptSector),
            count(Dataset::ZtPool),
            count(Dataset::DtPool),
            count(Dataset::ZbPool),
            count(Dataset::IndexQuote),
            dataset_results,
            record.error_message,
            record.error_stack,
            record.notes,
        ],
    )?;

    let id = conn.last_insert_rowid();
    tracing::debug!(
        "Created execution log entry: id={}, job_id={}, status={}",
        id,
        record.job_id,
        record.status.as_str()
    );

    Ok(id)
}

/// All runs recorded for an execution date, oldest first
pub fn get_logs_by_date(conn: &Connection, date: NaiveDate) -> Result<Vec<ExecutionRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE execution_date = ?1 ORDER BY execution_time ASC, id ASC",
        SELECT_COLUMNS
    ))?;

    let logs = stmt
        .query_map(params![date], map_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(logs)
}

/// Most recent runs of one job, newest recorded first regardless of target date
pub fn get_logs_by_job(
    conn: &Connection,
    job_id: &str,
    limit: usize,
) -> Result<Vec<ExecutionRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE job_id = ?1 ORDER BY id DESC LIMIT ?2",
        SELECT_COLUMNS
    ))?;

    let logs = stmt
        .query_map(params![job_id, limit as i64], map_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(logs)
}

/// Runs whose execution date falls in `[start, end]`, oldest first
pub fn get_logs_between(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<ExecutionRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE execution_date >= ?1 AND execution_date <= ?2 \
         ORDER BY execution_date ASC, execution_time ASC, id ASC",
        SELECT_COLUMNS
    ))?;

    let logs = stmt
        .query_map(params![start, end], map_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(logs)
}

/// Latest runs across all jobs (for the ops view)
pub fn get_recent_logs(conn: &Connection, limit: usize) -> Result<Vec<ExecutionRecord>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY id DESC LIMIT ?1", SELECT_COLUMNS))?;

    let logs = stmt
        .query_map(params![limit as i64], map_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(logs)
}

/// Ledger statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total: i64,
    pub success: i64,
    pub failed: i64,
    pub skipped: i64,
}

pub fn get_stats(conn: &Connection) -> Result<LedgerStats> {
    let stats = conn.query_row(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(status = 'success'), 0),
               COALESCE(SUM(status = 'failed'), 0),
               COALESCE(SUM(status = 'skipped'), 0)
        FROM job_execution_logs
        "#,
        [],
        |row| {
            Ok(LedgerStats {
                total: row.get(0)?,
                success: row.get(1)?,
                failed: row.get(2)?,
                skipped: row.get(3)?,
            })
        },
    )?;

    Ok(stats)
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<ExecutionRecord> {
    let status: String = row.get(5)?;
    let dataset_results: String = row.get(16)?;

    Ok(ExecutionRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        job_id: row.get(2)?,
        execution_date: row.get(3)?,
        execution_time: row.get(4)?,
        status: ExecutionStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("unknown execution status: {}", status).into(),
            )
        })?,
        trigger: row.get(6)?,
        forced: row.get(7)?,
        duration_ms: row.get(8)?,
        is_trading_day: row.get(9)?,
        industry_count: row.get(10)?,
        concept_count: row.get(11)?,
        zt_pool_count: row.get(12)?,
        dt_pool_count: row.get(13)?,
        zb_pool_count: row.get(14)?,
        index_count: row.get(15)?,
        dataset_results: serde_json::from_str::<Vec<DatasetResult>>(&dataset_results)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    16,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
        error_message: row.get(17)?,
        error_stack: row.get(18)?,
        notes: row.get(19)?,
        created_at: row.get(20)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::migrations;
    use crate::db::sqlite::models::RunTrigger;
    use std::collections::BTreeMap;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();
        conn
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(job_id: &str, day: &str, time: &str, status: ExecutionStatus) -> NewExecutionRecord {
        let mut dataset_counts = BTreeMap::new();
        dataset_counts.insert(Dataset::ZtPool, 42);
        NewExecutionRecord {
            run_id: format!("run-{}-{}", job_id, time),
            job_id: job_id.to_string(),
            execution_date: date(day),
            execution_time: format!("{}T{}+08:00", day, time),
            status,
            trigger: RunTrigger::Scheduled,
            forced: false,
            duration_ms: 1200,
            is_trading_day: status != ExecutionStatus::Skipped,
            dataset_counts,
            dataset_results: vec![DatasetResult {
                dataset: Dataset::IndexQuote,
                status: "failed".to_string(),
                rows: 0,
                attempts: 3,
                error: Some("timeout".to_string()),
                note: None,
            }],
            error_message: Some("index_quote: timeout".to_string()),
            error_stack: None,
            notes: None,
        }
    }

    #[test]
    fn test_create_and_read_back() {
        let conn = create_test_db();
        let id = create_log(&conn, &record("daily_snapshot_sync", "2025-06-10", "15:10:00", ExecutionStatus::Success)).unwrap();
        assert!(id > 0);

        let logs = get_logs_by_date(&conn, date("2025-06-10")).unwrap();
        assert_eq!(logs.len(), 1);
        let log = &logs[0];
        assert_eq!(log.id, id);
        assert_eq!(log.status, ExecutionStatus::Success);
        assert_eq!(log.count_for(Dataset::ZtPool), 42);
        assert_eq!(log.count_for(Dataset::IndexQuote), 0);
        assert_eq!(log.dataset_results[0].error.as_deref(), Some("timeout"));
        assert_eq!(log.trigger, "scheduled");
    }

    #[test]
    fn test_reruns_append_new_rows() {
        let conn = create_test_db();
        create_log(&conn, &record("daily_snapshot_sync", "2025-06-10", "15:10:00", ExecutionStatus::Failed)).unwrap();
        create_log(&conn, &record("daily_snapshot_sync", "2025-06-10", "16:02:11", ExecutionStatus::Success)).unwrap();

        let logs = get_logs_by_date(&conn, date("2025-06-10")).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].status, ExecutionStatus::Failed);
        assert_eq!(logs[1].status, ExecutionStatus::Success);
    }

    #[test]
    fn test_query_by_job_is_newest_first_and_limited() {
        let conn = create_test_db();
        create_log(&conn, &record("daily_snapshot_sync", "2025-06-09", "15:10:00", ExecutionStatus::Success)).unwrap();
        create_log(&conn, &record("zt_pool_recheck", "2025-06-10", "15:35:00", ExecutionStatus::Success)).unwrap();
        create_log(&conn, &record("daily_snapshot_sync", "2025-06-10", "15:10:00", ExecutionStatus::Success)).unwrap();
        create_log(&conn, &record("daily_snapshot_sync", "2025-06-11", "15:10:00", ExecutionStatus::Skipped)).unwrap();

        let logs = get_logs_by_job(&conn, "daily_snapshot_sync", 2).unwrap();
        let dates: Vec<String> = logs.iter().map(|l| l.execution_date.to_string()).collect();
        assert_eq!(dates, vec!["2025-06-11", "2025-06-10"]);
        assert!(logs.iter().all(|l| l.job_id == "daily_snapshot_sync"));

        // A backfill recorded last is the newest run even though its date is older
        let backfill = create_log(
            &conn,
            &record("daily_snapshot_sync", "2025-06-05", "15:10:00", ExecutionStatus::Success),
        )
        .unwrap();
        let logs = get_logs_by_job(&conn, "daily_snapshot_sync", 1).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].id, backfill);
        assert_eq!(logs[0].execution_date, date("2025-06-05"));
    }

    #[test]
    fn test_query_by_date_range_is_inclusive() {
        let conn = create_test_db();
        for day in ["2025-06-08", "2025-06-09", "2025-06-10", "2025-06-11"] {
            create_log(&conn, &record("daily_snapshot_sync", day, "15:10:00", ExecutionStatus::Success)).unwrap();
        }

        let logs = get_logs_between(&conn, date("2025-06-09"), date("2025-06-10")).unwrap();
        let dates: Vec<String> = logs.iter().map(|l| l.execution_date.to_string()).collect();
        assert_eq!(dates, vec!["2025-06-09", "2025-06-10"]);
    }

    #[test]
    fn test_stats_by_status() {
        let conn = create_test_db();
        create_log(&conn, &record("a", "2025-06-10", "15:10:00", ExecutionStatus::Success)).unwrap();
        create_log(&conn, &record("a", "2025-06-11", "15:10:00", ExecutionStatus::Failed)).unwrap();
        create_log(&conn, &record("a", "2025-06-14", "15:10:00", ExecutionStatus::Skipped)).unwrap();

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);

        let recent = get_recent_logs(&conn, 1).unwrap();
        assert_eq!(recent[0].status, ExecutionStatus::Skipped);
    }
}
