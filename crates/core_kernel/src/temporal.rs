//! Billing periods and academy-local dates
//!
//! Invoices are keyed by a calendar month. `BillingPeriod` carries that
//! `(month, year)` pair, orders oldest-first and derives the due date of the
//! month. `Timezone` resolves "today" in the academy's own timezone so that a
//! server running in UTC does not roll the month over early.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when building periods or dates
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid month {0}: must be between 1 and 12")]
    InvalidMonth(u32),

    #[error("Invalid due day {0}: must be between 1 and 31")]
    InvalidDueDay(u32),

    #[error("Date out of range for {year}-{month:02}")]
    OutOfRange { year: i32, month: u32 },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// A monthly billing period
///
/// Ordering is chronological: year first, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
    month: u32,
    year: i32,
}

impl BillingPeriod {
    /// Creates a period, validating the month
    pub fn new(month: u32, year: i32) -> Result<Self, TemporalError> {
        if !(1..=12).contains(&month) {
            return Err(TemporalError::InvalidMonth(month));
        }
        Ok(Self { month, year })
    }

    /// The period containing the given date
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            year: date.year(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// First calendar day of the period
    pub fn first_day(&self) -> NaiveDate {
        // month is validated on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN)
    }

    /// Last calendar day of the period
    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    /// The due date for this period on the given day of month
    ///
    /// Days past the end of a short month clamp to its last day, so a due day
    /// of 31 falls on 28/29 February.
    pub fn due_date(&self, due_day: u32) -> Result<NaiveDate, TemporalError> {
        if !(1..=31).contains(&due_day) {
            return Err(TemporalError::InvalidDueDay(due_day));
        }
        let day = due_day.min(self.last_day().day());
        NaiveDate::from_ymd_opt(self.year, self.month, day).ok_or(TemporalError::OutOfRange {
            year: self.year,
            month: self.month,
        })
    }

    /// The following month
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { month: 1, year: self.year + 1 }
        } else {
            Self { month: self.month + 1, year: self.year }
        }
    }
}

impl PartialOrd for BillingPeriod {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BillingPeriod {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.year, self.month).cmp(&(other.year, other.month))
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Timezone wrapper for the academy's local calendar
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Timezone {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s)
            .map(Timezone)
            .map_err(|_| TemporalError::InvalidTimezone(s.to_string()))
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(Tz::UTC)
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Calendar date of a UTC instant in this timezone
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        utc.with_timezone(&self.0).date_naive()
    }

    /// Today's calendar date in this timezone
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_rejects_invalid_month() {
        assert_eq!(BillingPeriod::new(0, 2024), Err(TemporalError::InvalidMonth(0)));
        assert_eq!(BillingPeriod::new(13, 2024), Err(TemporalError::InvalidMonth(13)));
    }

    #[test]
    fn test_period_ordering_is_chronological() {
        let dec_2023 = BillingPeriod::new(12, 2023).unwrap();
        let jan_2024 = BillingPeriod::new(1, 2024).unwrap();
        let feb_2024 = BillingPeriod::new(2, 2024).unwrap();

        let mut periods = vec![feb_2024, dec_2023, jan_2024];
        periods.sort();
        assert_eq!(periods, vec![dec_2023, jan_2024, feb_2024]);
    }

    #[test]
    fn test_due_date_on_fifth() {
        let period = BillingPeriod::containing(date(2024, 3, 17));
        assert_eq!(period.due_date(5).unwrap(), date(2024, 3, 5));
    }

    #[test]
    fn test_due_date_clamps_to_month_end() {
        let feb = BillingPeriod::new(2, 2024).unwrap();
        assert_eq!(feb.due_date(31).unwrap(), date(2024, 2, 29));
        assert_eq!(feb.due_date(0), Err(TemporalError::InvalidDueDay(0)));
    }

    #[test]
    fn test_next_wraps_year() {
        let dec = BillingPeriod::new(12, 2024).unwrap();
        assert_eq!(dec.next(), BillingPeriod::new(1, 2025).unwrap());
        assert!(dec < dec.next());
    }

    #[test]
    fn test_first_and_last_day() {
        let apr = BillingPeriod::new(4, 2024).unwrap();
        assert_eq!(apr.first_day(), date(2024, 4, 1));
        assert_eq!(apr.last_day(), date(2024, 4, 30));
    }

    #[test]
    fn test_display() {
        assert_eq!(BillingPeriod::new(1, 2024).unwrap().to_string(), "2024-01");
    }

    #[test]
    fn test_timezone_local_date_crosses_midnight() {
        let kolkata: Timezone = "Asia/Kolkata".parse().unwrap();
        let instant = Utc.with_ymd_and_hms(2024, 1, 31, 20, 0, 0).unwrap();
        assert_eq!(kolkata.local_date(instant), date(2024, 2, 1));
        assert_eq!(Timezone::default().local_date(instant), date(2024, 1, 31));
    }

    #[test]
    fn test_timezone_parse_error() {
        assert!(matches!(
            "Mars/Olympus".parse::<Timezone>(),
            Err(TemporalError::InvalidTimezone(_))
        ));
    }
}
