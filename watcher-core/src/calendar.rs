//! Reset calendar: period boundaries for daily and weekly resets.
//!
//! All arithmetic is on local wall-clock time (`NaiveDateTime`), so there is
//! no DST adjustment: a reset at 23:00 is 23:00 on the wall clock every day.
//!
//! Boundaries are inclusive on the low end: an instant exactly at a reset
//! belongs to the period that starts there.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::task::Reset;

fn reset_time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Start of the period containing `now`.
pub fn boundary(reset: Reset, now: NaiveDateTime) -> NaiveDateTime {
    match reset {
        Reset::Daily { hour } => {
            let today = now.date().and_time(reset_time(hour));
            if now < today {
                today - Duration::days(1)
            } else {
                today
            }
        }
        Reset::Weekly { weekday, hour } => {
            let current = now.weekday().num_days_from_sunday() as i64;
            let anchor = weekday.num_days_from_sunday() as i64;
            let day_diff = (current - anchor).rem_euclid(7);

            let candidate = (now.date() - Duration::days(day_diff)).and_time(reset_time(hour));
            // On the anchor weekday but before the reset hour: last week's reset.
            if day_diff == 0 && now < candidate {
                candidate - Duration::days(7)
            } else {
                candidate
            }
        }
    }
}

/// Start of the period after the one containing `now`.
pub fn next_boundary(reset: Reset, now: NaiveDateTime) -> NaiveDateTime {
    let start = boundary(reset, now);
    match reset {
        Reset::Daily { .. } => start + Duration::days(1),
        Reset::Weekly { .. } => start + Duration::days(7),
    }
}

/// Canonical identifier of one reset cycle: the calendar date of its boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey(NaiveDate);

impl PeriodKey {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Key of the period starting at `boundary`.
    pub fn from_boundary(boundary: NaiveDateTime) -> Self {
        Self(boundary.date())
    }

    /// Key of the period containing `now`.
    pub fn current(reset: Reset, now: NaiveDateTime) -> Self {
        Self::from_boundary(boundary(reset, now))
    }

    /// Key of the period in effect on `date` at the task's reset hour.
    ///
    /// For daily tasks this is `date` itself; for weekly tasks it is the most
    /// recent anchor weekday on or before `date`.
    pub fn on_date(reset: Reset, date: NaiveDate) -> Self {
        Self::current(reset, date.and_time(reset_time(reset.hour())))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl FromStr for PeriodKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), Self::FORMAT).map(Self)
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeriodKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
