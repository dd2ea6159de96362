//! Daily trigger time calculation

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::time::Duration;

/// Next instant strictly after `now` at `hour:minute` local time in `tz`.
///
/// Local times that do not exist on a given day (DST gaps) move on to the
/// next day.
pub fn next_fire_time(now: DateTime<Utc>, hour: u32, minute: u32, tz: Tz) -> Option<DateTime<Utc>> {
    let target = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let today = now.with_timezone(&tz).date_naive();

    (0..=2)
        .filter_map(|offset| {
            let day = today + ChronoDuration::days(offset);
            tz.from_local_datetime(&day.and_time(target)).earliest()
        })
        .map(|local| local.with_timezone(&Utc))
        .find(|fire| *fire > now)
}

/// Sleep duration from `now` until `fire`
pub fn duration_until(now: DateTime<Utc>, fire: DateTime<Utc>) -> Duration {
    (fire - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Shanghai;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_fire_later_today() {
        // 09:00 Shanghai -> 15:10 Shanghai the same day
        let next = next_fire_time(utc(2025, 6, 10, 1, 0), 15, 10, Shanghai).unwrap();
        assert_eq!(next, utc(2025, 6, 10, 7, 10));
    }

    #[test]
    fn test_fire_tomorrow_when_passed() {
        // 16:00 Shanghai -> 15:10 next day
        let next = next_fire_time(utc(2025, 6, 10, 8, 0), 15, 10, Shanghai).unwrap();
        assert_eq!(next, utc(2025, 6, 11, 7, 10));

        // Exactly at the trigger time the next fire is tomorrow
        let next = next_fire_time(utc(2025, 6, 10, 7, 10), 15, 10, Shanghai).unwrap();
        assert_eq!(next, utc(2025, 6, 11, 7, 10));
    }

    #[test]
    fn test_local_date_differs_from_utc_date() {
        // 2025-06-10 23:30 UTC is already 06-11 07:30 in Shanghai
        let next = next_fire_time(utc(2025, 6, 10, 23, 30), 15, 10, Shanghai).unwrap();
        assert_eq!(next, utc(2025, 6, 11, 7, 10));
    }

    #[test]
    fn test_dst_gap_moves_to_next_day() {
        // 02:30 does not exist in New York on 2025-03-09
        let tz: Tz = "America/New_York".parse().unwrap();
        let next = next_fire_time(utc(2025, 3, 9, 5, 0), 2, 30, tz).unwrap();
        assert_eq!(next, utc(2025, 3, 10, 6, 30));
    }

    #[test]
    fn test_invalid_time_and_duration() {
        assert!(next_fire_time(utc(2025, 6, 10, 1, 0), 24, 0, Shanghai).is_none());

        let now = utc(2025, 6, 10, 1, 0);
        assert_eq!(duration_until(now, utc(2025, 6, 10, 1, 5)), Duration::from_secs(300));
        assert_eq!(duration_until(now, utc(2025, 6, 10, 0, 5)), Duration::ZERO);
    }
}
