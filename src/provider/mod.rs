//! Market data provider boundary
//!
//! The provider is an opaque HTTP service that returns tabular rows for a
//! named function. Rows are JSON objects keyed by provider-native column
//! names; turning them into typed records is the job of `adapters`.

pub mod aktools;
#[cfg(test)]
pub(crate) mod mock;

use crate::error::Result;
use async_trait::async_trait;

pub use aktools::AkToolsProvider;

/// One raw provider row
pub type ProviderRow = serde_json::Map<String, serde_json::Value>;

/// Trait that every market data source must implement
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider ID used in logs
    fn id(&self) -> &'static str;

    /// Call a provider function with query parameters
    async fn fetch_rows(
        &self,
        function: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<ProviderRow>>;
}
