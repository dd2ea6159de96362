//! Snapshot Service
//!
//! Read contract for downstream consumers (dashboards, exports). Readers
//! only ever see whole partitions.

use crate::dataset::Dataset;
use crate::db::sqlite::models::{
    BoardType, ExplosiveStock, IndexQuote, LimitDownStock, LimitUpStock, SectorPerformance,
    StoredRecord,
};
use crate::db::sqlite::{Partition, SnapshotRow, SqliteDb};
use crate::db::with_db;
use crate::error::{AppError, Result};
use crate::state::AppState;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

/// Records of one dataset for a date range, ordered by (trade_date, rank)
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotResult {
    pub dataset: Dataset,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub count: usize,
    pub rows: Vec<serde_json::Value>,
}

/// Snapshot service for downstream reads
pub struct SnapshotService;

impl SnapshotService {
    /// One whole partition
    pub async fn get_snapshot(
        state: &AppState,
        dataset: Dataset,
        date: NaiveDate,
    ) -> Result<SnapshotResult> {
        Self::get_snapshots_between(state, dataset, date, date).await
    }

    /// Every partition with `start <= trade_date <= end`
    pub async fn get_snapshots_between(
        state: &AppState,
        dataset: Dataset,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SnapshotResult> {
        if start > end {
            return Err(AppError::Validation(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        info!("SnapshotService::get_snapshots_between - {} {}..={}", dataset, start, end);

        let rows = with_db(&state.sqlite, move |db| read_range(db, dataset, start, end)).await?;
        Ok(SnapshotResult {
            dataset,
            start,
            end,
            count: rows.len(),
            rows,
        })
    }

    /// Rows currently stored for a partition
    pub async fn partition_count(
        state: &AppState,
        dataset: Dataset,
        date: NaiveDate,
    ) -> Result<i64> {
        let partition = match board_type(dataset) {
            Some(board) => Partition::sector(date, board),
            None => Partition::new(date),
        };
        with_db(&state.sqlite, move |db| match dataset {
            Dataset::IndustrySector | Dataset::ConceptSector => {
                db.count_snapshot::<SectorPerformance>(&partition)
            }
            Dataset::ZtPool => db.count_snapshot::<LimitUpStock>(&partition),
            Dataset::DtPool => db.count_snapshot::<LimitDownStock>(&partition),
            Dataset::ZbPool => db.count_snapshot::<ExplosiveStock>(&partition),
            Dataset::IndexQuote => db.count_snapshot::<IndexQuote>(&partition),
        })
        .await
    }

    /// Dates with a stored partition, newest first
    pub async fn list_dates(state: &AppState, dataset: Dataset) -> Result<Vec<NaiveDate>> {
        let board = board_type(dataset);
        with_db(&state.sqlite, move |db| match dataset {
            Dataset::IndustrySector | Dataset::ConceptSector => {
                db.list_snapshot_dates::<SectorPerformance>(board)
            }
            Dataset::ZtPool => db.list_snapshot_dates::<LimitUpStock>(board),
            Dataset::DtPool => db.list_snapshot_dates::<LimitDownStock>(board),
            Dataset::ZbPool => db.list_snapshot_dates::<ExplosiveStock>(board),
            Dataset::IndexQuote => db.list_snapshot_dates::<IndexQuote>(board),
        })
        .await
    }
}

/// Sub-type of the sector datasets
fn board_type(dataset: Dataset) -> Option<BoardType> {
    match dataset {
        Dataset::IndustrySector => Some(BoardType::Industry),
        Dataset::ConceptSector => Some(BoardType::Concept),
        _ => None,
    }
}

fn read_range(
    db: &SqliteDb,
    dataset: Dataset,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<serde_json::Value>> {
    let board = board_type(dataset);
    match dataset {
        Dataset::IndustrySector | Dataset::ConceptSector => {
            to_values(db.get_snapshots_between::<SectorPerformance>(start, end, board)?)
        }
        Dataset::ZtPool => to_values(db.get_snapshots_between::<LimitUpStock>(start, end, board)?),
        Dataset::DtPool => {
            to_values(db.get_snapshots_between::<LimitDownStock>(start, end, board)?)
        }
        Dataset::ZbPool => {
            to_values(db.get_snapshots_between::<ExplosiveStock>(start, end, board)?)
        }
        Dataset::IndexQuote => {
            to_values(db.get_snapshots_between::<IndexQuote>(start, end, board)?)
        }
    }
}

fn to_values<R: SnapshotRow>(records: Vec<StoredRecord<R>>) -> Result<Vec<serde_json::Value>> {
    records
        .iter()
        .map(|r| serde_json::to_value(r).map_err(AppError::from))
        .collect()
}
