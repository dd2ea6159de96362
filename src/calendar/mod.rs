//! Trading calendar oracle
//!
//! Answers "is this a trading day?" for the sync gate. Lookups go through
//! an in-memory copy, then the persisted calendar, then the provider. When
//! the provider cannot be reached the answer is `true`: a wasted run on a
//! holiday is cheaper than a missed trading day.

use crate::adapters::normalize::parse_provider_date;
use crate::db::sqlite::SqliteDb;
use crate::db::with_db;
use crate::error::{AppError, Result};
use crate::provider::MarketDataProvider;
use chrono::{Datelike, NaiveDate, Weekday};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;

const CALENDAR_FUNCTION: &str = "tool_trade_date_hist_sina";

#[derive(Debug, Default)]
struct CalendarSnapshot {
    dates: BTreeSet<NaiveDate>,
}

impl CalendarSnapshot {
    fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    fn covers(&self, date: NaiveDate) -> bool {
        match (self.dates.first(), self.dates.last()) {
            (Some(first), Some(last)) => *first <= date && date <= *last,
            _ => false,
        }
    }

    fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }
}

/// Weekday rule used when no calendar covers a date
pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Trading calendar backed by the provider and the `trade_calendar` table
pub struct TradingCalendar {
    provider: Arc<dyn MarketDataProvider>,
    db: Arc<SqliteDb>,
    cache: RwLock<Option<CalendarSnapshot>>,
}

impl TradingCalendar {
    pub fn new(provider: Arc<dyn MarketDataProvider>, db: Arc<SqliteDb>) -> Self {
        Self {
            provider,
            db,
            cache: RwLock::new(None),
        }
    }

    /// Whether the exchange trades on `date`. Never fails.
    pub async fn is_trading_day(&self, date: NaiveDate) -> bool {
        if let Some(answer) = self.cached_answer(date) {
            return answer;
        }

        match self.load_persisted().await {
            Ok(true) => {
                if let Some(answer) = self.cached_answer(date) {
                    return answer;
                }
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to load stored trade calendar: {}", e),
        }

        match self.refresh().await {
            Ok(_) => match self.cached_answer(date) {
                Some(answer) => answer,
                None => {
                    let answer = is_weekday(date);
                    tracing::warn!(
                        "Trade calendar does not cover {}, using weekday rule ({})",
                        date,
                        answer
                    );
                    answer
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Trade calendar unavailable ({}), treating {} as a trading day",
                    e,
                    date
                );
                true
            }
        }
    }

    /// Fetch the calendar from the provider and persist it
    pub async fn refresh(&self) -> Result<usize> {
        let rows = self.provider.fetch_rows(CALENDAR_FUNCTION, &[]).await?;

        let dates: Vec<NaiveDate> = rows
            .iter()
            .filter_map(|row| row.get("trade_date").and_then(parse_provider_date))
            .collect();

        if dates.is_empty() {
            return Err(AppError::Provider(format!(
                "{} returned no usable dates ({} rows)",
                CALENDAR_FUNCTION,
                rows.len()
            )));
        }

        let snapshot = CalendarSnapshot::new(dates);
        let count = snapshot.dates.len();
        let to_store: Vec<NaiveDate> = snapshot.dates.iter().copied().collect();

        // Keep the in-memory copy even if persisting fails
        *self.cache.write() = Some(snapshot);

        if let Err(e) = with_db(&self.db, move |db| db.store_trade_dates(&to_store)).await {
            tracing::warn!("Failed to persist trade calendar: {}", e);
        }

        tracing::info!("Trade calendar refreshed with {} dates", count);
        Ok(count)
    }

    /// Trading days within `start..=end`, ascending
    pub async fn trading_days_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        if start > end {
            return Err(AppError::Validation(format!(
                "start {} is after end {}",
                start, end
            )));
        }

        let covered = self
            .cache
            .read()
            .as_ref()
            .map_or(false, |c| c.covers(start) && c.covers(end));
        if !covered && !self.load_persisted().await.unwrap_or(false) {
            self.refresh().await?;
        }

        let cache = self.cache.read();
        let snapshot = cache
            .as_ref()
            .ok_or_else(|| AppError::Internal("Trade calendar not loaded".to_string()))?;

        Ok(start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| {
                if snapshot.covers(*d) {
                    snapshot.contains(*d)
                } else {
                    is_weekday(*d)
                }
            })
            .collect())
    }

    fn cached_answer(&self, date: NaiveDate) -> Option<bool> {
        let cache = self.cache.read();
        cache
            .as_ref()
            .filter(|c| c.covers(date))
            .map(|c| c.contains(date))
    }

    /// Load the stored calendar into memory; `false` when nothing is stored
    async fn load_persisted(&self) -> Result<bool> {
        let dates = with_db(&self.db, |db| db.load_trade_dates()).await?;
        if dates.is_empty() {
            return Ok(false);
        }
        *self.cache.write() = Some(CalendarSnapshot::new(dates));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;
    use serde_json::json;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn test_db() -> (TempDir, Arc<SqliteDb>) {
        let dir = tempfile::tempdir().unwrap();
        let db = SqliteDb::new(&dir.path().join("test.db"), 2).unwrap();
        (dir, Arc::new(db))
    }

    /// June 2025 with the Dragon Boat holiday on the 2nd
    fn june_calendar() -> MockProvider {
        let days = ["2025-05-30", "2025-06-03", "2025-06-04", "2025-06-05", "2025-06-06", "2025-06-09", "2025-06-10"];
        MockProvider::new().with_rows(
            CALENDAR_FUNCTION,
            days.iter().map(|d| json!({ "trade_date": d })).collect(),
        )
    }

    #[tokio::test]
    async fn test_calendar_lookup_and_cache() {
        let (_dir, db) = test_db();
        let provider = Arc::new(june_calendar());
        let calendar = TradingCalendar::new(provider.clone(), db);

        assert!(calendar.is_trading_day(date("2025-06-10")).await);
        assert!(!calendar.is_trading_day(date("2025-06-02")).await);
        assert!(!calendar.is_trading_day(date("2025-06-07")).await);
        assert_eq!(provider.call_count(CALENDAR_FUNCTION), 1);
    }

    #[tokio::test]
    async fn test_fail_open_when_provider_down() {
        let (_dir, db) = test_db();
        let provider = MockProvider::new().with_failure(CALENDAR_FUNCTION, "connection refused");
        let calendar = TradingCalendar::new(Arc::new(provider), db);

        // Saturday, but the calendar cannot be consulted
        assert!(calendar.is_trading_day(date("2025-06-07")).await);
    }

    #[tokio::test]
    async fn test_persisted_calendar_survives_outage() {
        let (_dir, db) = test_db();
        TradingCalendar::new(Arc::new(june_calendar()), db.clone())
            .refresh()
            .await
            .unwrap();

        let down = MockProvider::new().with_failure(CALENDAR_FUNCTION, "timeout");
        let calendar = TradingCalendar::new(Arc::new(down), db);
        assert!(!calendar.is_trading_day(date("2025-06-02")).await);
        assert!(calendar.is_trading_day(date("2025-06-03")).await);
    }

    #[tokio::test]
    async fn test_weekday_rule_outside_calendar() {
        let (_dir, db) = test_db();
        let calendar = TradingCalendar::new(Arc::new(june_calendar()), db);

        assert!(calendar.is_trading_day(date("2025-07-01")).await);
        assert!(!calendar.is_trading_day(date("2025-07-05")).await);
    }

    #[tokio::test]
    async fn test_empty_calendar_is_an_error() {
        let (_dir, db) = test_db();
        let calendar = TradingCalendar::new(Arc::new(MockProvider::new()), db);

        assert!(calendar.refresh().await.is_err());
        assert!(calendar.is_trading_day(date("2025-06-07")).await);
    }

    #[tokio::test]
    async fn test_trading_days_between() {
        let (_dir, db) = test_db();
        let calendar = TradingCalendar::new(Arc::new(june_calendar()), db);

        let days = calendar
            .trading_days_between(date("2025-05-30"), date("2025-06-04"))
            .await
            .unwrap();
        assert_eq!(days, vec![date("2025-05-30"), date("2025-06-03"), date("2025-06-04")]);
        assert!(calendar
            .trading_days_between(date("2025-06-04"), date("2025-06-01"))
            .await
            .is_err());
    }
}
