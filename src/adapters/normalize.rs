//! Field normalization helpers for provider rows
//!
//! Provider values arrive as loosely typed JSON: numbers may be strings,
//! percentages may carry a `%` suffix, missing values are `null`, `""` or
//! `"-"`. Every helper returns `None` instead of failing so one bad field
//! never drops a whole record.

use crate::provider::ProviderRow;
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde_json::Value;

const YUAN_PER_YI: f64 = 100_000_000.0;

fn field<'a>(row: &'a ProviderRow, key: &str) -> Option<&'a Value> {
    row.get(key).filter(|v| !v.is_null())
}

fn clean_numeric(s: &str) -> Option<&str> {
    let s = s.trim().trim_end_matches('%').trim();
    if s.is_empty() || s == "-" || s == "--" {
        None
    } else {
        Some(s)
    }
}

/// Numeric field; accepts numbers and numeric strings such as `"5.23%"`
pub fn field_f64(row: &ProviderRow, key: &str) -> Option<f64> {
    let value = match field(row, key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => clean_numeric(s).and_then(|s| s.replace(',', "").parse::<f64>().ok()),
        _ => None,
    }?;
    value.is_finite().then_some(value)
}

/// Integer field; float values are rounded
pub fn field_i64(row: &ProviderRow, key: &str) -> Option<i64> {
    match field(row, key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = clean_numeric(s)?;
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.round() as i64)
                })
        }
        _ => None,
    }
}

/// Text field, trimmed; blank becomes `None`
pub fn field_string(row: &ProviderRow, key: &str) -> Option<String> {
    match field(row, key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Monetary field converted from 元 to 亿元
pub fn field_yi(row: &ProviderRow, key: &str) -> Option<f64> {
    field_f64(row, key).map(yuan_to_yi)
}

pub fn yuan_to_yi(yuan: f64) -> f64 {
    yuan / YUAN_PER_YI
}

/// Clock-time field; see [`parse_clock_time`]
pub fn field_clock_time(row: &ProviderRow, key: &str) -> Option<NaiveTime> {
    match field(row, key)? {
        Value::String(s) => parse_clock_time(s),
        Value::Number(n) => n.as_i64().and_then(|v| parse_clock_time(&v.to_string())),
        _ => None,
    }
}

/// Parse `HH:MM`, `HH:MM:SS` or compact `HHMMSS`.
///
/// The provider drops the leading zero of morning times (`92500` for
/// 09:25:00), so five digit values are left-padded.
pub fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if s.contains(':') {
        return NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .ok();
    }

    if !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let digits = match s.len() {
        6 => s.to_string(),
        5 => format!("0{}", s),
        4 => format!("{}00", s),
        _ => return None,
    };
    NaiveTime::parse_from_str(&digits, "%H%M%S").ok()
}

/// Provider ordinal, falling back to the 1-based row position
pub fn rank_or_position(row: &ProviderRow, key: &str, index: usize) -> i64 {
    field_i64(row, key)
        .filter(|rank| *rank > 0)
        .unwrap_or(index as i64 + 1)
}

/// Date parameter format expected by the provider
pub fn provider_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Parse a calendar date as returned by the provider.
///
/// Accepts `YYYY-MM-DD` (optionally followed by a time part), `YYYYMMDD`
/// and epoch milliseconds.
pub fn parse_provider_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            let head = s.get(..10).unwrap_or(s);
            NaiveDate::parse_from_str(head, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
                .ok()
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.date_naive()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> ProviderRow {
        match value {
            Value::Object(map) => map,
            _ => panic!("test row must be an object"),
        }
    }

    #[test]
    fn test_field_f64_variants() {
        let r = row(json!({
            "a": 5.23, "b": "5.23%", "c": " 1,234.5 ", "d": "-", "e": null, "f": "abc", "g": ""
        }));
        assert_eq!(field_f64(&r, "a"), Some(5.23));
        assert_eq!(field_f64(&r, "b"), Some(5.23));
        assert_eq!(field_f64(&r, "c"), Some(1234.5));
        assert_eq!(field_f64(&r, "d"), None);
        assert_eq!(field_f64(&r, "e"), None);
        assert_eq!(field_f64(&r, "f"), None);
        assert_eq!(field_f64(&r, "g"), None);
        assert_eq!(field_f64(&r, "missing"), None);
    }

    #[test]
    fn test_field_i64_and_string() {
        let r = row(json!({"n": 3, "f": 2.6, "s": "7", "code": " 000001 ", "num_code": 600000, "blank": "  "}));
        assert_eq!(field_i64(&r, "n"), Some(3));
        assert_eq!(field_i64(&r, "f"), Some(3));
        assert_eq!(field_i64(&r, "s"), Some(7));
        assert_eq!(field_string(&r, "code").as_deref(), Some("000001"));
        assert_eq!(field_string(&r, "num_code").as_deref(), Some("600000"));
        assert_eq!(field_string(&r, "blank"), None);
    }

    #[test]
    fn test_yuan_to_yi() {
        let r = row(json!({"amount": 523_000_000.0}));
        assert_eq!(field_yi(&r, "amount"), Some(5.23));
        assert_eq!(yuan_to_yi(100_000_000.0), 1.0);
    }

    #[test]
    fn test_parse_clock_time() {
        let t = |h, m, s| NaiveTime::from_hms_opt(h, m, s);
        assert_eq!(parse_clock_time("09:25:00"), t(9, 25, 0));
        assert_eq!(parse_clock_time("14:56"), t(14, 56, 0));
        assert_eq!(parse_clock_time("092500"), t(9, 25, 0));
        assert_eq!(parse_clock_time("92500"), t(9, 25, 0));
        assert_eq!(parse_clock_time("145612"), t(14, 56, 12));
        assert_eq!(parse_clock_time(""), None);
        assert_eq!(parse_clock_time("-"), None);
        assert_eq!(parse_clock_time("256000"), None);
        assert_eq!(parse_clock_time("12"), None);

        let r = row(json!({"num": 93000, "text": "093000"}));
        assert_eq!(field_clock_time(&r, "num"), t(9, 30, 0));
        assert_eq!(field_clock_time(&r, "text"), t(9, 30, 0));
    }

    #[test]
    fn test_rank_fallback() {
        let r = row(json!({"序号": 4, "zero": 0}));
        assert_eq!(rank_or_position(&r, "序号", 0), 4);
        assert_eq!(rank_or_position(&r, "zero", 2), 3);
        assert_eq!(rank_or_position(&r, "missing", 9), 10);
    }

    #[test]
    fn test_provider_dates() {
        let d = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        assert_eq!(provider_date(d), "20250610");
        assert_eq!(parse_provider_date(&json!("2025-06-10")), Some(d));
        assert_eq!(parse_provider_date(&json!("2025-06-10T00:00:00.000")), Some(d));
        assert_eq!(parse_provider_date(&json!("20250610")), Some(d));
        assert_eq!(parse_provider_date(&json!(1749513600000_i64)), Some(d));
        assert_eq!(parse_provider_date(&json!("not a date")), None);
    }
}
