//! Persisted trading calendar
//!
//! Holds the last calendar successfully fetched from the provider so the
//! trading-day gate survives provider outages.

use crate::error::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection};

/// Replace the stored calendar (batch insert with transaction)
pub fn store_trade_dates(conn: &mut Connection, dates: &[NaiveDate]) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM trade_calendar", [])?;

    let mut stmt = tx.prepare("INSERT OR IGNORE INTO trade_calendar (trade_date) VALUES (?1)")?;
    for date in dates {
        stmt.execute(params![date])?;
    }

    drop(stmt);
    tx.commit()?;

    tracing::info!("Stored {} trade dates in database", dates.len());
    Ok(())
}

/// Load the stored calendar in ascending order
pub fn load_trade_dates(conn: &Connection) -> Result<Vec<NaiveDate>> {
    let mut stmt = conn.prepare("SELECT trade_date FROM trade_calendar ORDER BY trade_date ASC")?;

    let dates = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<NaiveDate>, _>>()?;

    tracing::debug!("Loaded {} trade dates from database", dates.len());
    Ok(dates)
}

/// Check whether a date is in the stored calendar
pub fn is_trade_date(conn: &Connection, date: NaiveDate) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM trade_calendar WHERE trade_date = ?1",
        params![date],
        |row| row.get(0),
    )?;

    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::migrations;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_store_replaces_previous_calendar() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();

        store_trade_dates(&mut conn, &[date("2025-06-09"), date("2025-06-10")]).unwrap();
        store_trade_dates(&mut conn, &[date("2025-06-11"), date("2025-06-10")]).unwrap();

        let dates = load_trade_dates(&conn).unwrap();
        assert_eq!(dates, vec![date("2025-06-10"), date("2025-06-11")]);
        assert!(is_trade_date(&conn, date("2025-06-11")).unwrap());
        assert!(!is_trade_date(&conn, date("2025-06-09")).unwrap());
    }
}
