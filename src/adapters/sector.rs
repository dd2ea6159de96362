//! Industry and concept board performance

use super::normalize::{field_f64, field_i64, field_string, field_yi, rank_or_position};
use super::{call_provider, normalize_rows, FetchAdapter, FetchResult};
use crate::dataset::Dataset;
use crate::db::sqlite::models::{BoardType, SectorPerformance};
use crate::db::sqlite::Partition;
use crate::error::Result;
use crate::provider::{MarketDataProvider, ProviderRow};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// Board list adapter; one instance per board type
pub struct SectorAdapter {
    provider: Arc<dyn MarketDataProvider>,
    board_type: BoardType,
}

impl SectorAdapter {
    pub fn new(provider: Arc<dyn MarketDataProvider>, board_type: BoardType) -> Self {
        Self {
            provider,
            board_type,
        }
    }

    fn function(&self) -> &'static str {
        match self.board_type {
            BoardType::Industry => "stock_board_industry_name_em",
            BoardType::Concept => "stock_board_concept_name_em",
        }
    }
}

fn to_record(index: usize, row: &ProviderRow) -> Option<SectorPerformance> {
    Some(SectorPerformance {
        rank: rank_or_position(row, "排名", index),
        board_name: field_string(row, "板块名称")?,
        board_code: field_string(row, "板块代码"),
        latest_price: field_f64(row, "最新价"),
        change_amount: field_f64(row, "涨跌额"),
        change_pct: field_f64(row, "涨跌幅"),
        total_market_cap: field_yi(row, "总市值"),
        turnover_rate: field_f64(row, "换手率"),
        up_count: field_i64(row, "上涨家数"),
        down_count: field_i64(row, "下跌家数"),
        leading_stock: field_string(row, "领涨股票"),
        leading_stock_change_pct: field_f64(row, "领涨股票-涨跌幅"),
    })
}

#[async_trait]
impl FetchAdapter for SectorAdapter {
    type Record = SectorPerformance;

    fn dataset(&self) -> Dataset {
        self.board_type.dataset()
    }

    fn partition(&self, trade_date: NaiveDate) -> Partition {
        Partition::sector(trade_date, self.board_type)
    }

    /// Board lists are live; `as_of` is not sent to the provider
    async fn fetch(&self, _as_of: NaiveDate) -> Result<FetchResult<SectorPerformance>> {
        let raw =
            call_provider(self.provider.as_ref(), self.dataset(), self.function(), &[]).await?;
        let rows = normalize_rows(self.dataset(), raw, to_record);
        Ok(FetchResult { rows })
    }
}
