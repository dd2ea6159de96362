//! Fetch adapters
//!
//! One adapter per dataset. An adapter calls the provider and normalizes the
//! raw rows into typed records. Adapters never write to the store.

pub mod index_quote;
pub mod limit_pools;
pub mod normalize;
pub mod sector;

use crate::dataset::Dataset;
use crate::db::sqlite::{Partition, SnapshotRow};
use crate::error::{AppError, Result};
use crate::provider::{MarketDataProvider, ProviderRow};
use async_trait::async_trait;
use chrono::NaiveDate;

pub use index_quote::IndexQuoteAdapter;
pub use limit_pools::{DtPoolAdapter, ZbPoolAdapter, ZtPoolAdapter};
pub use sector::SectorAdapter;

/// Normalized rows of one fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult<R> {
    pub rows: Vec<R>,
}

impl<R> FetchResult<R> {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Trait that every dataset adapter must implement
#[async_trait]
pub trait FetchAdapter: Send + Sync {
    type Record: SnapshotRow;

    fn dataset(&self) -> Dataset;

    /// Partition the records of `trade_date` are stored in
    fn partition(&self, trade_date: NaiveDate) -> Partition {
        Partition::new(trade_date)
    }

    /// Fetch and normalize the dataset as of `as_of`
    async fn fetch(&self, as_of: NaiveDate) -> Result<FetchResult<Self::Record>>;
}

/// Call the provider, tagging failures with the dataset
pub(crate) async fn call_provider(
    provider: &dyn MarketDataProvider,
    dataset: Dataset,
    function: &str,
    params: &[(&str, String)],
) -> Result<Vec<ProviderRow>> {
    provider.fetch_rows(function, params).await.map_err(|e| match e {
        AppError::Http(_) | AppError::Provider(_) | AppError::Fetch(_) => {
            AppError::Fetch(format!("{} via {}: {}", dataset, function, e))
        }
        other => other,
    })
}

/// Convert raw rows, dropping the ones `convert` rejects
pub(crate) fn normalize_rows<R, F>(dataset: Dataset, rows: Vec<ProviderRow>, convert: F) -> Vec<R>
where
    F: Fn(usize, &ProviderRow) -> Option<R>,
{
    let total = rows.len();
    let records: Vec<R> = rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let record = convert(index, row);
            if record.is_none() {
                tracing::debug!("Dropping {} row {} without identity fields", dataset, index + 1);
            }
            record
        })
        .collect();

    if records.len() < total {
        tracing::debug!(
            "Normalized {} of {} {} rows",
            records.len(),
            total,
            dataset
        );
    }
    records
}
