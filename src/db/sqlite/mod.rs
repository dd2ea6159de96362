//! SQLite database module

pub mod execution_logs;
pub mod jobs;
pub mod migrations;
pub mod models;
pub mod snapshots;
pub mod trade_calendar;

use crate::error::Result;
use chrono::NaiveDate;
pub use execution_logs::LedgerStats;
use models::*;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
pub use snapshots::{Partition, ReplaceOutcome, SnapshotRow};
use std::path::Path;

type SqlitePool = Pool<SqliteConnectionManager>;

/// SQLite database wrapper
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Open (or create) the database file and run migrations
    pub fn new(path: &Path, pool_size: u32) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            // Enable WAL mode for better concurrent access
            conn.execute_batch(
                "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=5000;",
            )
        });
        let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;

        let db = Self { pool };
        db.run_migrations()?;

        tracing::info!("SQLite database opened at {:?}", path);
        Ok(db)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        migrations::run_migrations(&conn)
    }

    /// Check out a pooled connection
    pub fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    // ========== Snapshot Methods ==========

    /// Replace one partition with freshly fetched rows
    pub fn replace_snapshot<R: SnapshotRow>(
        &self,
        partition: &Partition,
        rows: &[R],
    ) -> Result<ReplaceOutcome> {
        let mut conn = self.conn()?;
        snapshots::replace_partition(&mut conn, partition, rows)
    }

    /// Read one whole partition
    pub fn get_snapshot<R: SnapshotRow>(
        &self,
        partition: &Partition,
    ) -> Result<Vec<StoredRecord<R>>> {
        let conn = self.conn()?;
        snapshots::get_partition(&conn, partition)
    }

    /// Read all partitions within an inclusive date range
    pub fn get_snapshots_between<R: SnapshotRow>(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        board_type: Option<BoardType>,
    ) -> Result<Vec<StoredRecord<R>>> {
        let conn = self.conn()?;
        snapshots::get_partitions_between(&conn, start, end, board_type)
    }

    /// Row count of one partition
    pub fn count_snapshot<R: SnapshotRow>(&self, partition: &Partition) -> Result<i64> {
        let conn = self.conn()?;
        snapshots::count_partition::<R>(&conn, partition)
    }

    /// Dates with a stored partition, newest first
    pub fn list_snapshot_dates<R: SnapshotRow>(
        &self,
        board_type: Option<BoardType>,
    ) -> Result<Vec<NaiveDate>> {
        let conn = self.conn()?;
        snapshots::list_partition_dates::<R>(&conn, board_type)
    }

    // ========== Execution Ledger Methods ==========

    /// Append one run summary to the ledger
    pub fn record_execution(&self, record: &NewExecutionRecord) -> Result<i64> {
        let conn = self.conn()?;
        execution_logs::create_log(&conn, record)
    }

    pub fn get_executions_by_date(&self, date: NaiveDate) -> Result<Vec<ExecutionRecord>> {
        let conn = self.conn()?;
        execution_logs::get_logs_by_date(&conn, date)
    }

    pub fn get_executions_by_job(
        &self,
        job_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>> {
        let conn = self.conn()?;
        execution_logs::get_logs_by_job(&conn, job_id, limit)
    }

    pub fn get_executions_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ExecutionRecord>> {
        let conn = self.conn()?;
        execution_logs::get_logs_between(&conn, start, end)
    }

    pub fn get_recent_executions(&self, limit: usize) -> Result<Vec<ExecutionRecord>> {
        let conn = self.conn()?;
        execution_logs::get_recent_logs(&conn, limit)
    }

    pub fn get_execution_stats(&self) -> Result<LedgerStats> {
        let conn = self.conn()?;
        execution_logs::get_stats(&conn)
    }

    // ========== Trade Calendar Methods ==========

    pub fn store_trade_dates(&self, dates: &[NaiveDate]) -> Result<()> {
        let mut conn = self.conn()?;
        trade_calendar::store_trade_dates(&mut conn, dates)
    }

    pub fn load_trade_dates(&self) -> Result<Vec<NaiveDate>> {
        let conn = self.conn()?;
        trade_calendar::load_trade_dates(&conn)
    }

    // ========== Job Methods ==========

    pub fn get_jobs(&self) -> Result<Vec<SyncJobConfig>> {
        let conn = self.conn()?;
        jobs::get_jobs(&conn)
    }

    pub fn get_job(&self, job_id: &str) -> Result<Option<SyncJobConfig>> {
        let conn = self.conn()?;
        jobs::get_job(&conn, job_id)
    }

    /// Update a job schedule
    pub fn update_job(
        &self,
        job_id: &str,
        hour: Option<u32>,
        minute: Option<u32>,
        timezone: Option<String>,
        enabled: Option<bool>,
    ) -> Result<SyncJobConfig> {
        let conn = self.conn()?;
        jobs::update_job(&conn, job_id, hour, minute, timezone, enabled)
    }
}
