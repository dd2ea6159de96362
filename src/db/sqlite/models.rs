//! Database models

use crate::dataset::Dataset;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Snapshot records
// ============================================================================

/// Board type of a sector performance partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardType {
    Industry,
    Concept,
}

impl BoardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoardType::Industry => "industry",
            BoardType::Concept => "concept",
        }
    }

    pub fn dataset(&self) -> Dataset {
        match self {
            BoardType::Industry => Dataset::IndustrySector,
            BoardType::Concept => Dataset::ConceptSector,
        }
    }
}

/// Industry or concept board performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorPerformance {
    pub rank: i64,
    pub board_name: String,
    pub board_code: Option<String>,
    pub latest_price: Option<f64>,
    pub change_amount: Option<f64>,
    pub change_pct: Option<f64>,
    /// 亿元
    pub total_market_cap: Option<f64>,
    pub turnover_rate: Option<f64>,
    pub up_count: Option<i64>,
    pub down_count: Option<i64>,
    pub leading_stock: Option<String>,
    pub leading_stock_change_pct: Option<f64>,
}

/// Limit-up pool entry. Monetary amounts are in 亿元.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitUpStock {
    pub rank: i64,
    pub code: String,
    pub name: String,
    pub change_pct: Option<f64>,
    pub latest_price: Option<f64>,
    pub turnover_amount: Option<f64>,
    pub float_market_cap: Option<f64>,
    pub total_market_cap: Option<f64>,
    pub turnover_rate: Option<f64>,
    pub seal_amount: Option<f64>,
    pub first_seal_time: Option<NaiveTime>,
    pub last_seal_time: Option<NaiveTime>,
    pub break_count: Option<i64>,
    pub limit_up_stats: Option<String>,
    pub consecutive_boards: Option<i64>,
    pub industry: Option<String>,
}

/// Limit-down pool entry. Monetary amounts are in 亿元.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitDownStock {
    pub rank: i64,
    pub code: String,
    pub name: String,
    pub change_pct: Option<f64>,
    pub latest_price: Option<f64>,
    pub turnover_amount: Option<f64>,
    pub float_market_cap: Option<f64>,
    pub total_market_cap: Option<f64>,
    pub pe_dynamic: Option<f64>,
    pub turnover_rate: Option<f64>,
    pub seal_amount: Option<f64>,
    pub last_seal_time: Option<NaiveTime>,
    pub board_turnover_amount: Option<f64>,
    pub consecutive_limit_downs: Option<i64>,
    pub open_count: Option<i64>,
    pub industry: Option<String>,
}

/// Explosive-board (opened after limit-up) pool entry. Monetary amounts are in 亿元.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplosiveStock {
    pub rank: i64,
    pub code: String,
    pub name: String,
    pub change_pct: Option<f64>,
    pub latest_price: Option<f64>,
    pub limit_up_price: Option<f64>,
    pub turnover_amount: Option<f64>,
    pub float_market_cap: Option<f64>,
    pub total_market_cap: Option<f64>,
    pub turnover_rate: Option<f64>,
    pub rise_speed: Option<f64>,
    pub first_seal_time: Option<NaiveTime>,
    pub break_count: Option<i64>,
    pub limit_up_stats: Option<String>,
    pub amplitude: Option<f64>,
    pub industry: Option<String>,
}

/// Index quote. `turnover_amount` is in 亿元.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQuote {
    pub rank: i64,
    pub code: String,
    pub name: String,
    pub latest_price: Option<f64>,
    pub change_pct: Option<f64>,
    pub change_amount: Option<f64>,
    pub volume: Option<f64>,
    pub turnover_amount: Option<f64>,
    pub amplitude: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub open: Option<f64>,
    pub prev_close: Option<f64>,
    pub volume_ratio: Option<f64>,
}

/// A stored record together with the partition it belongs to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord<R> {
    pub trade_date: NaiveDate,
    #[serde(flatten)]
    pub record: R,
}

// ============================================================================
// Execution ledger
// ============================================================================

/// Terminal status of one orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(ExecutionStatus::Success),
            "failed" => Some(ExecutionStatus::Failed),
            "skipped" => Some(ExecutionStatus::Skipped),
            _ => None,
        }
    }
}

/// What fired a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Scheduled,
    Manual,
}

impl RunTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunTrigger::Scheduled => "scheduled",
            RunTrigger::Manual => "manual",
        }
    }
}

/// Outcome of one dataset step as kept in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetResult {
    pub dataset: Dataset,
    pub status: String,
    pub rows: usize,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Summary written once per orchestration run
#[derive(Debug, Clone, PartialEq)]
pub struct NewExecutionRecord {
    pub run_id: String,
    pub job_id: String,
    pub execution_date: NaiveDate,
    pub execution_time: String,
    pub status: ExecutionStatus,
    pub trigger: RunTrigger,
    pub forced: bool,
    pub duration_ms: i64,
    pub is_trading_day: bool,
    pub dataset_counts: BTreeMap<Dataset, usize>,
    pub dataset_results: Vec<DatasetResult>,
    pub error_message: Option<String>,
    pub error_stack: Option<String>,
    pub notes: Option<String>,
}

/// One row of the execution ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub id: i64,
    pub run_id: String,
    pub job_id: String,
    pub execution_date: NaiveDate,
    pub execution_time: String,
    pub status: ExecutionStatus,
    pub trigger: String,
    pub forced: bool,
    pub duration_ms: i64,
    pub is_trading_day: bool,
    pub industry_count: i64,
    pub concept_count: i64,
    pub zt_pool_count: i64,
    pub dt_pool_count: i64,
    pub zb_pool_count: i64,
    pub index_count: i64,
    pub dataset_results: Vec<DatasetResult>,
    pub error_message: Option<String>,
    pub error_stack: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

impl ExecutionRecord {
    /// Saved row count for a dataset
    pub fn count_for(&self, dataset: Dataset) -> i64 {
        match dataset {
            Dataset::IndustrySector => self.industry_count,
            Dataset::ConceptSector => self.concept_count,
            Dataset::ZtPool => self.zt_pool_count,
            Dataset::DtPool => self.dt_pool_count,
            Dataset::ZbPool => self.zb_pool_count,
            Dataset::IndexQuote => self.index_count,
        }
    }
}

// ============================================================================
// Job configuration
// ============================================================================

/// Persisted schedule of a sync job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJobConfig {
    pub job_id: String,
    pub name: String,
    pub hour: u32,
    pub minute: u32,
    pub timezone: String,
    pub datasets: Vec<Dataset>,
    pub enabled: bool,
}
