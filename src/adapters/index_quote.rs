//! Important index quotes (沪深重要指数)

use super::normalize::{field_f64, field_string, field_yi, rank_or_position};
use super::{call_provider, normalize_rows, FetchAdapter, FetchResult};
use crate::dataset::Dataset;
use crate::db::sqlite::models::IndexQuote;
use crate::error::Result;
use crate::provider::{MarketDataProvider, ProviderRow};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

const FUNCTION: &str = "stock_zh_index_spot_em";
const INDEX_GROUP: &str = "沪深重要指数";

pub struct IndexQuoteAdapter {
    provider: Arc<dyn MarketDataProvider>,
}

impl IndexQuoteAdapter {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

fn to_record(index: usize, row: &ProviderRow) -> Option<IndexQuote> {
    Some(IndexQuote {
        rank: rank_or_position(row, "序号", index),
        code: field_string(row, "代码")?,
        name: field_string(row, "名称")?,
        latest_price: field_f64(row, "最新价"),
        change_pct: field_f64(row, "涨跌幅"),
        change_amount: field_f64(row, "涨跌额"),
        volume: field_f64(row, "成交量"),
        turnover_amount: field_yi(row, "成交额"),
        amplitude: field_f64(row, "振幅"),
        high: field_f64(row, "最高"),
        low: field_f64(row, "最低"),
        open: field_f64(row, "今开"),
        prev_close: field_f64(row, "昨收"),
        volume_ratio: field_f64(row, "量比"),
    })
}

#[async_trait]
impl FetchAdapter for IndexQuoteAdapter {
    type Record = IndexQuote;

    fn dataset(&self) -> Dataset {
        Dataset::IndexQuote
    }

    /// Spot quotes are live; `as_of` is not sent to the provider
    async fn fetch(&self, _as_of: NaiveDate) -> Result<FetchResult<IndexQuote>> {
        let params = [("symbol", INDEX_GROUP.to_string())];
        let raw = call_provider(self.provider.as_ref(), self.dataset(), FUNCTION, &params).await?;
        Ok(FetchResult {
            rows: normalize_rows(self.dataset(), raw, to_record),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;
    use serde_json::json;

    #[tokio::test]
    async fn test_index_quotes() {
        let provider = Arc::new(MockProvider::new().with_rows(
            FUNCTION,
            vec![
                json!({
                    "序号": 1, "代码": "000001", "名称": "上证指数", "最新价": 3384.82,
                    "涨跌幅": -0.44, "涨跌额": -14.95, "成交量": 430_000_000.0,
                    "成交额": 512_300_000_000.0, "最高": 3400.1, "最低": 3370.2,
                    "今开": 3398.0, "昨收": 3399.77, "量比": 1.02
                }),
                json!({"序号": 2, "代码": "399001", "名称": "深证成指"}),
            ],
        ));
        let adapter = IndexQuoteAdapter::new(provider.clone());

        let rows = adapter
            .fetch(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap())
            .await
            .unwrap()
            .rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].turnover_amount, Some(5123.0));
        assert_eq!(rows[0].prev_close, Some(3399.77));
        assert_eq!(rows[1].latest_price, None);
        assert_eq!(
            provider.last_params(FUNCTION),
            Some(vec![("symbol".to_string(), INDEX_GROUP.to_string())])
        );
    }
}
