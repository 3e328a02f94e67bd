//! Time utilities: timezone-aware "now" and the in-game clock.
//!
//! Reset calendars work on local wall-clock time (`NaiveDateTime`). These
//! helpers turn a UTC instant into that wall clock for a configured zone.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::error::{Result, WatcherError};

/// Real seconds per in-game hour is 175; the in-game clock runs 3600/175 times faster.
pub const EORZEA_MULTIPLIER: f64 = 3600.0 / 175.0;

/// Parse an IANA zone name like "Asia/Taipei".
pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| WatcherError::Config(format!("invalid timezone: {tz}")))
}

/// Wall-clock time in `tz` at the UTC instant `now`.
pub fn local_wall_clock(now: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    now.with_timezone(&tz).naive_local()
}

/// Current wall-clock time in `tz`.
pub fn local_now(tz: Tz) -> NaiveDateTime {
    local_wall_clock(Utc::now(), tz)
}

/// Convert a real instant to the Eorzea clock, returned as a UTC-based naive datetime
/// whose time-of-day is the in-game time.
pub fn eorzea_time(now: DateTime<Utc>) -> NaiveDateTime {
    let millis = now.timestamp_millis() as f64 * EORZEA_MULTIPLIER;
    DateTime::from_timestamp_millis(millis.round() as i64)
        .unwrap_or_default()
        .naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_taipei_wall_clock() {
        let tz = parse_timezone("Asia/Taipei").unwrap();
        let utc = Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap();
        let local = local_wall_clock(utc, tz);
        assert_eq!(local.to_string(), "2024-01-02 23:00:00");
    }

    #[test]
    fn test_invalid_timezone() {
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_eorzea_clock_runs_faster() {
        // 175 real seconds is exactly one Eorzea hour.
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = a + chrono::Duration::seconds(175);
        let ea = eorzea_time(a);
        let eb = eorzea_time(b);
        let ms = (eb - ea).num_milliseconds();
        assert!((3_599_990..=3_600_010).contains(&ms));
    }
}
