//! Logical datasets synchronized by the service

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One independently synchronized category of market data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    IndustrySector,
    ConceptSector,
    ZtPool,
    DtPool,
    ZbPool,
    IndexQuote,
}

impl Dataset {
    /// All datasets, in registry order
    pub const ALL: [Dataset; 6] = [
        Dataset::IndustrySector,
        Dataset::ConceptSector,
        Dataset::ZtPool,
        Dataset::DtPool,
        Dataset::ZbPool,
        Dataset::IndexQuote,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::IndustrySector => "industry_sector",
            Dataset::ConceptSector => "concept_sector",
            Dataset::ZtPool => "zt_pool",
            Dataset::DtPool => "dt_pool",
            Dataset::ZbPool => "zb_pool",
            Dataset::IndexQuote => "index_quote",
        }
    }

    /// Human readable label used in log lines and ledger notes
    pub fn label(&self) -> &'static str {
        match self {
            Dataset::IndustrySector => "industry sectors",
            Dataset::ConceptSector => "concept sectors",
            Dataset::ZtPool => "limit-up pool",
            Dataset::DtPool => "limit-down pool",
            Dataset::ZbPool => "explosive-board pool",
            Dataset::IndexQuote => "index quotes",
        }
    }

    /// Denormalized row-count column in the execution ledger
    pub fn count_column(&self) -> &'static str {
        match self {
            Dataset::IndustrySector => "industry_count",
            Dataset::ConceptSector => "concept_count",
            Dataset::ZtPool => "zt_pool_count",
            Dataset::DtPool => "dt_pool_count",
            Dataset::ZbPool => "zb_pool_count",
            Dataset::IndexQuote => "index_count",
        }
    }

    /// Whether the provider can return this dataset for a past date.
    ///
    /// Sector and index data are live snapshots taken at call time.
    pub fn supports_historical(&self) -> bool {
        matches!(self, Dataset::ZtPool | Dataset::DtPool | Dataset::ZbPool)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Dataset::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("Unknown dataset: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip_names() {
        for dataset in Dataset::ALL {
            assert_eq!(dataset.as_str().parse::<Dataset>().unwrap(), dataset);
        }
        assert!("lhb".parse::<Dataset>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Dataset::ZtPool).unwrap();
        assert_eq!(json, "\"zt_pool\"");
    }

    #[test]
    fn test_live_only_datasets() {
        assert!(!Dataset::IndustrySector.supports_historical());
        assert!(!Dataset::IndexQuote.supports_historical());
        assert!(Dataset::ZbPool.supports_historical());
    }
}
