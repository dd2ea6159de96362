//! Snapshot partitions with replace-on-write semantics
//!
//! Every dataset table is partitioned by `trade_date` (plus `board_type` for
//! sector performance). A partition is only ever written as a whole: the
//! previous rows are deleted and the new rows inserted inside one
//! transaction. Readers always receive whole partitions.

use super::models::{
    BoardType, ExplosiveStock, IndexQuote, LimitDownStock, LimitUpStock, SectorPerformance,
    StoredRecord,
};
use crate::error::{AppError, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, Row, ToSql, TransactionBehavior};
use serde::Serialize;

/// A record type stored in one partitioned snapshot table
pub trait SnapshotRow: Serialize + Sized + Send + Sync + 'static {
    /// Table holding this record type
    const TABLE: &'static str;

    /// Sub-type column that is part of the partition key, if any
    const SUB_TYPE_COLUMN: Option<&'static str> = None;

    /// Data columns in insert order; must match [`SnapshotRow::params`]
    const COLUMNS: &'static [&'static str];

    fn params(&self) -> Vec<&dyn ToSql>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Key of one replaceable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    pub trade_date: NaiveDate,
    pub board_type: Option<BoardType>,
}

impl Partition {
    pub fn new(trade_date: NaiveDate) -> Self {
        Self {
            trade_date,
            board_type: None,
        }
    }

    pub fn sector(trade_date: NaiveDate, board_type: BoardType) -> Self {
        Self {
            trade_date,
            board_type: Some(board_type),
        }
    }

    fn key_params<R: SnapshotRow>(&self) -> Result<Vec<Box<dyn ToSql>>> {
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(self.trade_date)];
        match (R::SUB_TYPE_COLUMN, self.board_type) {
            (Some(_), Some(board_type)) => params.push(Box::new(board_type.as_str())),
            (None, None) => {}
            (Some(column), None) => {
                return Err(AppError::Validation(format!(
                    "{} partitions require a {} value",
                    R::TABLE,
                    column
                )))
            }
            (None, Some(_)) => {
                return Err(AppError::Validation(format!(
                    "{} partitions have no sub-type",
                    R::TABLE
                )))
            }
        }
        Ok(params)
    }

    fn where_clause<R: SnapshotRow>(&self) -> String {
        match R::SUB_TYPE_COLUMN {
            Some(column) => format!("trade_date = ?1 AND {} = ?2", column),
            None => "trade_date = ?1".to_string(),
        }
    }
}

/// Result of a replace call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The partition now holds exactly the new rows
    Replaced { deleted: usize, inserted: usize },
    /// The fetch was empty; any existing partition was left untouched
    PreservedOnEmpty,
}

impl ReplaceOutcome {
    /// Rows newly saved by this call
    pub fn saved(&self) -> usize {
        match self {
            ReplaceOutcome::Replaced { inserted, .. } => *inserted,
            ReplaceOutcome::PreservedOnEmpty => 0,
        }
    }
}

/// Replace a whole partition with `rows` in a single transaction.
///
/// An empty `rows` slice never deletes: a transiently empty provider response
/// must not wipe a good snapshot. On any error the transaction is dropped
/// and rolled back, so the previous partition survives intact.
pub fn replace_partition<R: SnapshotRow>(
    conn: &mut Connection,
    partition: &Partition,
    rows: &[R],
) -> Result<ReplaceOutcome> {
    let key = partition.key_params::<R>()?;

    if rows.is_empty() {
        tracing::info!(
            "Empty result for {} {}, keeping existing partition",
            R::TABLE,
            partition.trade_date
        );
        return Ok(ReplaceOutcome::PreservedOnEmpty);
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let key_refs: Vec<&dyn ToSql> = key.iter().map(|p| p.as_ref()).collect();
    let deleted = tx.execute(
        &format!(
            "DELETE FROM {} WHERE {}",
            R::TABLE,
            partition.where_clause::<R>()
        ),
        key_refs.as_slice(),
    )?;

    let mut columns = vec!["trade_date"];
    columns.extend(R::SUB_TYPE_COLUMN);
    columns.extend_from_slice(R::COLUMNS);
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    let mut stmt = tx.prepare(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        R::TABLE,
        columns.join(", "),
        placeholders
    ))?;

    for row in rows {
        let mut params = key_refs.clone();
        params.extend(row.params());
        stmt.execute(params.as_slice())?;
    }

    drop(stmt);
    tx.commit()?;

    tracing::debug!(
        "Replaced {} {} partition: deleted={}, inserted={}",
        R::TABLE,
        partition.trade_date,
        deleted,
        rows.len()
    );

    Ok(ReplaceOutcome::Replaced {
        deleted,
        inserted: rows.len(),
    })
}

/// Read one whole partition ordered by rank
pub fn get_partition<R: SnapshotRow>(
    conn: &Connection,
    partition: &Partition,
) -> Result<Vec<StoredRecord<R>>> {
    let key = partition.key_params::<R>()?;
    let key_refs: Vec<&dyn ToSql> = key.iter().map(|p| p.as_ref()).collect();

    let sql = format!(
        "SELECT * FROM {} WHERE {} ORDER BY rank ASC",
        R::TABLE,
        partition.where_clause::<R>()
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(key_refs.as_slice(), stored_from_row::<R>)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Read every partition with `start <= trade_date <= end`
pub fn get_partitions_between<R: SnapshotRow>(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
    board_type: Option<BoardType>,
) -> Result<Vec<StoredRecord<R>>> {
    let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(start), Box::new(end)];
    let mut sql = format!(
        "SELECT * FROM {} WHERE trade_date >= ?1 AND trade_date <= ?2",
        R::TABLE
    );

    match (R::SUB_TYPE_COLUMN, board_type) {
        (Some(column), Some(board_type)) => {
            sql.push_str(&format!(" AND {} = ?3", column));
            params.push(Box::new(board_type.as_str()));
        }
        (Some(column), None) => {
            return Err(AppError::Validation(format!(
                "{} range reads require a {} value",
                R::TABLE,
                column
            )))
        }
        (None, _) => {}
    }
    sql.push_str(" ORDER BY trade_date ASC, rank ASC");

    let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params_refs.as_slice(), stored_from_row::<R>)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Number of rows currently stored for a partition
pub fn count_partition<R: SnapshotRow>(conn: &Connection, partition: &Partition) -> Result<i64> {
    let key = partition.key_params::<R>()?;
    let key_refs: Vec<&dyn ToSql> = key.iter().map(|p| p.as_ref()).collect();

    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            R::TABLE,
            partition.where_clause::<R>()
        ),
        key_refs.as_slice(),
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Dates that currently have a stored partition, newest first
pub fn list_partition_dates<R: SnapshotRow>(
    conn: &Connection,
    board_type: Option<BoardType>,
) -> Result<Vec<NaiveDate>> {
    let dates = match (R::SUB_TYPE_COLUMN, board_type) {
        (Some(column), Some(board_type)) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT DISTINCT trade_date FROM {} WHERE {} = ?1 ORDER BY trade_date DESC",
                R::TABLE,
                column
            ))?;
            let dates = stmt
                .query_map([board_type.as_str()], |row| row.get(0))?
                .collect::<std::result::Result<Vec<NaiveDate>, _>>()?;
            dates
        }
        _ => {
            let mut stmt = conn.prepare(&format!(
                "SELECT DISTINCT trade_date FROM {} ORDER BY trade_date DESC",
                R::TABLE
            ))?;
            let dates = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<NaiveDate>, _>>()?;
            dates
        }
    };
    Ok(dates)
}

fn stored_from_row<R: SnapshotRow>(row: &Row<'_>) -> rusqlite::Result<StoredRecord<R>> {
    Ok(StoredRecord {
        trade_date: row.get("trade_date")?,
        record: R::from_row(row)?,
    })
}

// ============================================================================
// Dataset tables
// ============================================================================

impl SnapshotRow for SectorPerformance {
    const TABLE: &'static str = "sector_performance";
    const SUB_TYPE_COLUMN: Option<&'static str> = Some("board_type");
    const COLUMNS: &'static [&'static str] = &[
        "rank",
        "board_name",
        "board_code",
        "latest_price",
        "change_amount",
        "change_pct",
        "total_market_cap",
        "turnover_rate",
        "up_count",
        "down_count",
        "leading_stock",
        "leading_stock_change_pct",
    ];

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.rank,
            &self.board_name,
            &self.board_code,
            &self.latest_price,
            &self.change_amount,
            &self.change_pct,
            &self.total_market_cap,
            &self.turnover_rate,
            &self.up_count,
            &self.down_count,
            &self.leading_stock,
            &self.leading_stock_change_pct,
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SectorPerformance {
            rank: row.get("rank")?,
            board_name: row.get("board_name")?,
            board_code: row.get("board_code")?,
            latest_price: row.get("latest_price")?,
            change_amount: row.get("change_amount")?,
            change_pct: row.get("change_pct")?,
            total_market_cap: row.get("total_market_cap")?,
            turnover_rate: row.get("turnover_rate")?,
            up_count: row.get("up_count")?,
            down_count: row.get("down_count")?,
            leading_stock: row.get("leading_stock")?,
            leading_stock_change_pct: row.get("leading_stock_change_pct")?,
        })
    }
}

impl SnapshotRow for LimitUpStock {
    const TABLE: &'static str = "zt_pool";
    const COLUMNS: &'static [&'static str] = &[
        "rank",
        "code",
        "name",
        "change_pct",
        "latest_price",
        "turnover_amount",
        "float_market_cap",
        "total_market_cap",
        "turnover_rate",
        "seal_amount",
        "first_seal_time",
        "last_seal_time",
        "break_count",
        "limit_up_stats",
        "consecutive_boards",
        "industry",
    ];

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.rank,
            &self.code,
            &self.name,
            &self.change_pct,
            &self.latest_price,
            &self.turnover_amount,
            &self.float_market_cap,
            &self.total_market_cap,
            &self.turnover_rate,
            &self.seal_amount,
            &self.first_seal_time,
            &self.last_seal_time,
            &self.break_count,
            &self.limit_up_stats,
            &self.consecutive_boards,
            &self.industry,
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(LimitUpStock {
            rank: row.get("rank")?,
            code: row.get("code")?,
            name: row.get("name")?,
            change_pct: row.get("change_pct")?,
            latest_price: row.get("latest_price")?,
            turnover_amount: row.get("turnover_amount")?,
            float_market_cap: row.get("float_market_cap")?,
            total_market_cap: row.get("total_market_cap")?,
            turnover_rate: row.get("turnover_rate")?,
            seal_amount: row.get("seal_amount")?,
            first_seal_time: row.get("first_seal_time")?,
            last_seal_time: row.get("last_seal_time")?,
            break_count: row.get("break_count")?,
            limit_up_stats: row.get("limit_up_stats")?,
            consecutive_boards: row.get("consecutive_boards")?,
            industry: row.get("industry")?,
        })
    }
}

impl SnapshotRow for LimitDownStock {
    const TABLE: &'static str = "dt_pool";
    const COLUMNS: &'static [&'static str] = &[
        "rank",
        "code",
        "name",
        "change_pct",
        "latest_price",
        "turnover_amount",
        "float_market_cap",
        "total_market_cap",
        "pe_dynamic",
        "turnover_rate",
        "seal_amount",
        "last_seal_time",
        "board_turnover_amount",
        "consecutive_limit_downs",
        "open_count",
        "industry",
    ];

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.rank,
            &self.code,
            &self.name,
            &self.change_pct,
            &self.latest_price,
            &self.turnover_amount,
            &self.float_market_cap,
            &self.total_market_cap,
            &self.pe_dynamic,
            &self.turnover_rate,
            &self.seal_amount,
            &self.last_seal_time,
            &self.board_turnover_amount,
            &self.consecutive_limit_downs,
            &self.open_count,
            &self.industry,
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(LimitDownStock {
            rank: row.get("rank")?,
            code: row.get("code")?,
            name: row.get("name")?,
            change_pct: row.get("change_pct")?,
            latest_price: row.get("latest_price")?,
            turnover_amount: row.get("turnover_amount")?,
            float_market_cap: row.get("float_market_cap")?,
            total_market_cap: row.get("total_market_cap")?,
            pe_dynamic: row.get("pe_dynamic")?,
            turnover_rate: row.get("turnover_rate")?,
            seal_amount: row.get("seal_amount")?,
            last_seal_time: row.get("last_seal_time")?,
            board_turnover_amount: row.get("board_turnover_amount")?,
            consecutive_limit_downs: row.get("consecutive_limit_downs")?,
            open_count: row.get("open_count")?,
            industry: row.get("industry")?,
        })
    }
}

impl SnapshotRow for ExplosiveStock {
    const TABLE: &'static str = "zb_pool";
    const COLUMNS: &'static [&'static str] = &[
        "rank",
        "code",
        "name",
        "change_pct",
        "latest_price",
        "limit_up_price",
        "turnover_amount",
        "float_market_cap",
        "total_market_cap",
        "turnover_rate",
        "rise_speed",
        "first_seal_time",
        "break_count",
        "limit_up_stats",
        "amplitude",
        "industry",
    ];

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.rank,
            &self.code,
            &self.name,
            &self.change_pct,
            &self.latest_price,
            &self.limit_up_price,
            &self.turnover_amount,
            &self.float_market_cap,
            &self.total_market_cap,
            &self.turnover_rate,
            &self.rise_speed,
            &self.first_seal_time,
            &self.break_count,
            &self.limit_up_stats,
            &self.amplitude,
            &self.industry,
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ExplosiveStock {
            rank: row.get("rank")?,
            code: row.get("code")?,
            name: row.get("name")?,
            change_pct: row.get("change_pct")?,
            latest_price: row.get("latest_price")?,
            limit_up_price: row.get("limit_up_price")?,
            turnover_amount: row.get("turnover_amount")?,
            float_market_cap: row.get("float_market_cap")?,
            total_market_cap: row.get("total_market_cap")?,
            turnover_rate: row.get("turnover_rate")?,
            rise_speed: row.get("rise_speed")?,
            first_seal_time: row.get("first_seal_time")?,
            break_count: row.get("break_count")?,
            limit_up_stats: row.get("limit_up_stats")?,
            amplitude: row.get("amplitude")?,
            industry: row.get("industry")?,
        })
    }
}

impl SnapshotRow for IndexQuote {
    const TABLE: &'static str = "index_quotes";
    const COLUMNS: &'static [&'static str] = &[
        "rank",
        "code",
        "name",
        "latest_price",
        "change_pct",
        "change_amount",
        "volume",
        "turnover_amount",
        "amplitude",
        "high",
        "low",
        "open",
        "prev_close",
        "volume_ratio",
    ];

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.rank,
            &self.code,
            &self.name,
            &self.latest_price,
            &self.change_pct,
            &self.change_amount,
            &self.volume,
            &self.turnover_amount,
            &self.amplitude,
            &self.high,
            &self.low,
            &self.open,
            &self.prev_close,
            &self.volume_ratio,
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(IndexQuote {
            rank: row.get("rank")?,
            code: row.get("code")?,
            name: row.get("name")?,
            latest_price: row.get("latest_price")?,
            change_pct: row.get("change_pct")?,
            change_amount: row.get("change_amount")?,
            volume: row.get("volume")?,
            turnover_amount: row.get("turnover_amount")?,
            amplitude: row.get("amplitude")?,
            high: row.get("high")?,
            low: row.get("low")?,
            open: row.get("open")?,
            prev_close: row.get("prev_close")?,
            volume_ratio: row.get("volume_ratio")?,
        })
    }
}
