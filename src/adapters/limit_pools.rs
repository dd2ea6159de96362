//! Limit-up, limit-down and explosive-board pools
//!
//! These are the only datasets the provider serves for a past date; the
//! as-of date is sent as `date=YYYYMMDD`.

use super::normalize::{
    field_clock_time, field_f64, field_i64, field_string, field_yi, provider_date, rank_or_position,
};
use super::{call_provider, normalize_rows, FetchAdapter, FetchResult};
use crate::dataset::Dataset;
use crate::db::sqlite::models::{ExplosiveStock, LimitDownStock, LimitUpStock};
use crate::error::Result;
use crate::provider::{MarketDataProvider, ProviderRow};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

async fn fetch_pool<R>(
    provider: &dyn MarketDataProvider,
    dataset: Dataset,
    function: &str,
    as_of: NaiveDate,
    convert: fn(usize, &ProviderRow) -> Option<R>,
) -> Result<FetchResult<R>> {
    let params = [("date", provider_date(as_of))];
    let raw = call_provider(provider, dataset, function, &params).await?;
    Ok(FetchResult {
        rows: normalize_rows(dataset, raw, convert),
    })
}

// ============================================================================
// Limit-up
// ============================================================================

pub struct ZtPoolAdapter {
    provider: Arc<dyn MarketDataProvider>,
}

impl ZtPoolAdapter {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

fn limit_up_record(index: usize, row: &ProviderRow) -> Option<LimitUpStock> {
    Some(LimitUpStock {
        rank: rank_or_position(row, "序号", index),
        code: field_string(row, "代码")?,
        name: field_string(row, "名称")?,
        change_pct: field_f64(row, "涨跌幅"),
        latest_price: field_f64(row, "最新价"),
        turnover_amount: field_yi(row, "成交额"),
        float_market_cap: field_yi(row, "流通市值"),
        total_market_cap: field_yi(row, "总市值"),
        turnover_rate: field_f64(row, "换手率"),
        seal_amount: field_yi(row, "封板资金"),
        first_seal_time: field_clock_time(row, "首次封板时间"),
        last_seal_time: field_clock_time(row, "最后封板时间"),
        break_count: field_i64(row, "炸板次数"),
        limit_up_stats: field_string(row, "涨停统计"),
        consecutive_boards: field_i64(row, "连板数"),
        industry: field_string(row, "所属行业"),
    })
}

#[async_trait]
impl FetchAdapter for ZtPoolAdapter {
    type Record = LimitUpStock;

    fn dataset(&self) -> Dataset {
        Dataset::ZtPool
    }

    async fn fetch(&self, as_of: NaiveDate) -> Result<FetchResult<LimitUpStock>> {
        fetch_pool(
            self.provider.as_ref(),
            self.dataset(),
            "stock_zt_pool_em",
            as_of,
            limit_up_record,
        )
        .await
    }
}

// ============================================================================
// Limit-down
// ============================================================================

pub struct DtPoolAdapter {
    provider: Arc<dyn MarketDataProvider>,
}

impl DtPoolAdapter {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

fn limit_down_record(index: usize, row: &ProviderRow) -> Option<LimitDownStock> {
    Some(LimitDownStock {
        rank: rank_or_position(row, "序号", index),
        code: field_string(row, "代码")?,
        name: field_string(row, "名称")?,
        change_pct: field_f64(row, "涨跌幅"),
        latest_price: field_f64(row, "最新价"),
        turnover_amount: field_yi(row, "成交额"),
        float_market_cap: field_yi(row, "流通市值"),
        total_market_cap: field_yi(row, "总市值"),
        pe_dynamic: field_f64(row, "动态市盈率"),
        turnover_rate: field_f64(row, "换手率"),
        seal_amount: field_yi(row, "封单资金"),
        last_seal_time: field_clock_time(row, "最后封板时间"),
        board_turnover_amount: field_yi(row, "板上成交额"),
        consecutive_limit_downs: field_i64(row, "连续跌停"),
        open_count: field_i64(row, "开板次数"),
        industry: field_string(row, "所属行业"),
    })
}

#[async_trait]
impl FetchAdapter for DtPoolAdapter {
    type Record = LimitDownStock;

    fn dataset(&self) -> Dataset {
        Dataset::DtPool
    }

    async fn fetch(&self, as_of: NaiveDate) -> Result<FetchResult<LimitDownStock>> {
        fetch_pool(
            self.provider.as_ref(),
            self.dataset(),
            "stock_zt_pool_dtgc_em",
            as_of,
            limit_down_record,
        )
        .await
    }
}

// ============================================================================
// Explosive board
// ============================================================================

pub struct ZbPoolAdapter {
    provider: Arc<dyn MarketDataProvider>,
}

impl ZbPoolAdapter {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

fn explosive_record(index: usize, row: &ProviderRow) -> Option<ExplosiveStock> {
    Some(ExplosiveStock {
        rank: rank_or_position(row, "序号", index),
        code: field_string(row, "代码")?,
        name: field_string(row, "名称")?,
        change_pct: field_f64(row, "涨跌幅"),
        latest_price: field_f64(row, "最新价"),
        limit_up_price: field_f64(row, "涨停价"),
        turnover_amount: field_yi(row, "成交额"),
        float_market_cap: field_yi(row, "流通市值"),
        total_market_cap: field_yi(row, "总市值"),
        turnover_rate: field_f64(row, "换手率"),
        rise_speed: field_f64(row, "涨速"),
        first_seal_time: field_clock_time(row, "首次封板时间"),
        break_count: field_i64(row, "炸板次数"),
        limit_up_stats: field_string(row, "涨停统计"),
        amplitude: field_f64(row, "振幅"),
        industry: field_string(row, "所属行业"),
    })
}

#[async_trait]
impl FetchAdapter for ZbPoolAdapter {
    type Record = ExplosiveStock;

    fn dataset(&self) -> Dataset {
        Dataset::ZbPool
    }

    async fn fetch(&self, as_of: NaiveDate) -> Result<FetchResult<ExplosiveStock>> {
        fetch_pool(
            self.provider.as_ref(),
            self.dataset(),
            "stock_zt_pool_zbgc_em",
            as_of,
            explosive_record,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;
    use chrono::NaiveTime;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    #[tokio::test]
    async fn test_zt_pool_sends_date_and_normalizes() {
        let provider = Arc::new(MockProvider::new().with_rows(
            "stock_zt_pool_em",
            vec![
                json!({
                    "序号": 1, "代码": "600000", "名称": "浦发银行", "涨跌幅": 10.02,
                    "最新价": 11.2, "成交额": 1_250_000_000.0, "流通市值": 32_000_000_000.0,
                    "总市值": 32_800_000_000.0, "换手率": 3.9, "封板资金": 150_000_000.0,
                    "首次封板时间": "092500", "最后封板时间": "14:56:12", "炸板次数": 0,
                    "涨停统计": "2/2", "连板数": 2, "所属行业": "银行"
                }),
                json!({"序号": 2, "代码": "000001", "名称": "平安银行", "首次封板时间": "garbage"}),
                json!({"序号": 3, "名称": "no code"}),
            ],
        ));
        let adapter = ZtPoolAdapter::new(provider.clone());

        let result = adapter.fetch(date()).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(
            provider.last_params("stock_zt_pool_em"),
            Some(vec![("date".to_string(), "20250610".to_string())])
        );

        let first = &result.rows[0];
        assert_eq!(first.turnover_amount, Some(12.5));
        assert_eq!(first.seal_amount, Some(1.5));
        assert_eq!(first.first_seal_time, NaiveTime::from_hms_opt(9, 25, 0));
        assert_eq!(first.last_seal_time, NaiveTime::from_hms_opt(14, 56, 12));
        assert_eq!(first.consecutive_boards, Some(2));

        // An unparseable time keeps the record
        let second = &result.rows[1];
        assert_eq!(second.code, "000001");
        assert_eq!(second.first_seal_time, None);
    }

    #[tokio::test]
    async fn test_dt_pool_fields() {
        let provider = MockProvider::new().with_rows(
            "stock_zt_pool_dtgc_em",
            vec![json!({
                "序号": 1, "代码": "300001", "名称": "特锐德", "封单资金": 20_000_000.0,
                "板上成交额": 50_000_000.0, "连续跌停": 2, "开板次数": 1, "动态市盈率": -12.5,
                "最后封板时间": "100312"
            })],
        );
        let adapter = DtPoolAdapter::new(Arc::new(provider));

        let rows = adapter.fetch(date()).await.unwrap().rows;
        assert_eq!(rows[0].seal_amount, Some(0.2));
        assert_eq!(rows[0].board_turnover_amount, Some(0.5));
        assert_eq!(rows[0].consecutive_limit_downs, Some(2));
        assert_eq!(rows[0].pe_dynamic, Some(-12.5));
        assert_eq!(rows[0].last_seal_time, NaiveTime::from_hms_opt(10, 3, 12));
    }

    #[tokio::test]
    async fn test_zb_pool_fields() {
        let provider = MockProvider::new().with_rows(
            "stock_zt_pool_zbgc_em",
            vec![json!({
                "序号": 1, "代码": "002594", "名称": "比亚迪", "涨停价": 300.3,
                "涨速": 0.8, "炸板次数": 3, "振幅": "12.5%", "首次封板时间": 93512
            })],
        );
        let adapter = ZbPoolAdapter::new(Arc::new(provider));

        let rows = adapter.fetch(date()).await.unwrap().rows;
        assert_eq!(rows[0].limit_up_price, Some(300.3));
        assert_eq!(rows[0].break_count, Some(3));
        assert_eq!(rows[0].amplitude, Some(12.5));
        assert_eq!(rows[0].first_seal_time, NaiveTime::from_hms_opt(9, 35, 12));
    }

    #[tokio::test]
    async fn test_empty_pool_is_not_an_error() {
        let adapter = ZtPoolAdapter::new(Arc::new(MockProvider::new()));
        let result = adapter.fetch(date()).await.unwrap();
        assert!(result.is_empty());
    }
}
