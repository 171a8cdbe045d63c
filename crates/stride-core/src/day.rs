//! Calendar-day identity and the injected clock.
//!
//! A [`DayKey`] is fixed to a local calendar day when it is created and is
//! persisted as `YYYY-MM-DD`. It is never recomputed from a stored instant,
//! so a device time-zone change cannot move a recorded day.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DAY_FORMAT: &str = "%Y-%m-%d";

/// A local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Build from year/month/day, `None` if the date does not exist.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Parse the persisted `YYYY-MM-DD` form.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        NaiveDate::parse_from_str(s, DAY_FORMAT).map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The calendar day before this one.
    pub fn pred(&self) -> Self {
        Self(self.0 - Duration::days(1))
    }

    /// The calendar day after this one.
    pub fn succ(&self) -> Self {
        Self(self.0 + Duration::days(1))
    }

    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Whole days from `earlier` to `self` (negative if `earlier` is later).
    pub fn days_since(&self, earlier: DayKey) -> i64 {
        (self.0 - earlier.0).num_days()
    }

    /// Whether both days fall in the same calendar month of the same year.
    pub fn same_month(&self, other: DayKey) -> bool {
        self.0.year() == other.0.year() && self.0.month() == other.0.month()
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DayKey::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Source of "today" for every component.
pub trait Clock: Send + Sync {
    fn today(&self) -> DayKey;
}

/// Wall clock in the device's local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> DayKey {
        DayKey(Local::now().date_naive())
    }
}

/// A clock that only moves when told to. Used to simulate day boundaries.
#[derive(Debug)]
pub struct ManualClock {
    day: Mutex<DayKey>,
}

impl ManualClock {
    pub fn new(day: DayKey) -> Self {
        Self {
            day: Mutex::new(day),
        }
    }

    pub fn set(&self, day: DayKey) {
        *self.day.lock().unwrap_or_else(PoisonError::into_inner) = day;
    }

    /// Move forward (or back, for negative values) by whole days.
    pub fn advance_days(&self, days: i64) {
        let mut guard = self.day.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = guard.add_days(days);
    }
}

impl Clock for ManualClock {
    fn today(&self) -> DayKey {
        *self.day.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> DayKey {
        DayKey::parse(s).unwrap()
    }

    #[test]
    fn display_uses_fixed_form() {
        assert_eq!(day("2024-01-05").to_string(), "2024-01-05");
        assert_eq!(DayKey::from_ymd(2024, 12, 31).unwrap().to_string(), "2024-12-31");
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(DayKey::parse("2024-13-01").is_err());
        assert!(DayKey::parse("05/01/2024").is_err());
    }

    #[test]
    fn pred_and_succ_cross_month_and_year() {
        assert_eq!(day("2024-03-01").pred(), day("2024-02-29"));
        assert_eq!(day("2023-12-31").succ(), day("2024-01-01"));
        assert_eq!(day("2024-01-10").days_since(day("2024-01-03")), 7);
    }

    #[test]
    fn same_month_checks_year_too() {
        assert!(day("2024-05-01").same_month(day("2024-05-31")));
        assert!(!day("2024-05-31").same_month(day("2024-06-01")));
        assert!(!day("2023-05-10").same_month(day("2024-05-10")));
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&day("2024-07-04")).unwrap();
        assert_eq!(json, "\"2024-07-04\"");
        let back: DayKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, day("2024-07-04"));
        assert!(serde_json::from_str::<DayKey>("\"yesterday\"").is_err());
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(day("2024-02-28"));
        clock.advance_days(2);
        assert_eq!(clock.today(), day("2024-03-01"));
        clock.set(day("2025-01-01"));
        assert_eq!(clock.today(), day("2025-01-01"));
    }
}
