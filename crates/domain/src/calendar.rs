//! Delivery-week calendar: weekday resolution and ordering cutoffs.

use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default hour (local time) after which same-day ordering closes.
pub const DEFAULT_CUTOFF_HOUR: u32 = 13;

/// Errors produced while interpreting calendar input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    /// The input does not name a day of the week.
    #[error("Invalid weekday: {0:?}")]
    InvalidWeekday(String),
}

/// Day of the week a cart or order day is scheduled for.
///
/// Serialized and displayed with its full English name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// All weekdays, Monday first.
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Returns the full English name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }

    /// Days since Monday (Monday = 0, Sunday = 6).
    pub fn num_days_from_monday(&self) -> u32 {
        chrono::Weekday::from(*self).num_days_from_monday()
    }

    /// Returns the weekday of a calendar date.
    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }
}

impl std::fmt::Display for Weekday {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Weekday {
    type Err = CalendarError;

    /// Accepts full names and three-letter abbreviations, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Ok(Weekday::Monday),
            "tuesday" | "tue" => Ok(Weekday::Tuesday),
            "wednesday" | "wed" => Ok(Weekday::Wednesday),
            "thursday" | "thu" => Ok(Weekday::Thursday),
            "friday" | "fri" => Ok(Weekday::Friday),
            "saturday" | "sat" => Ok(Weekday::Saturday),
            "sunday" | "sun" => Ok(Weekday::Sunday),
            _ => Err(CalendarError::InvalidWeekday(s.to_string())),
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

impl From<Weekday> for chrono::Weekday {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Monday => chrono::Weekday::Mon,
            Weekday::Tuesday => chrono::Weekday::Tue,
            Weekday::Wednesday => chrono::Weekday::Wed,
            Weekday::Thursday => chrono::Weekday::Thu,
            Weekday::Friday => chrono::Weekday::Fri,
            Weekday::Saturday => chrono::Weekday::Sat,
            Weekday::Sunday => chrono::Weekday::Sun,
        }
    }
}

/// Parses a weekday name, signalling `InvalidWeekday` for anything else.
pub fn parse_weekday(name: &str) -> Result<Weekday, CalendarError> {
    name.parse()
}

/// Source of the current local wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current local date and time.
    fn now(&self) -> NaiveDateTime;
}

/// Clock backed by the host's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(NaiveDateTime);

impl FixedClock {
    /// Creates a clock that always reports `at`.
    pub fn new(at: NaiveDateTime) -> Self {
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Maps weekdays onto dates of the current delivery week and applies the
/// same-day ordering cutoff.
///
/// Weeks start on Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayDateResolver {
    cutoff_hour: u32,
}

impl DayDateResolver {
    /// Creates a resolver whose same-day window closes at `cutoff_hour`.
    pub fn new(cutoff_hour: u32) -> Self {
        Self { cutoff_hour }
    }

    /// Returns the configured cutoff hour.
    pub fn cutoff_hour(&self) -> u32 {
        self.cutoff_hour
    }

    /// Returns the Monday of the week containing `reference`.
    pub fn week_start(&self, reference: NaiveDateTime) -> NaiveDate {
        let date = reference.date();
        date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
    }

    /// Returns the date of `weekday` within the week containing `reference`.
    pub fn resolve_date_for_weekday(&self, weekday: Weekday, reference: NaiveDateTime) -> NaiveDate {
        self.week_start(reference) + Duration::days(i64::from(weekday.num_days_from_monday()))
    }

    /// Same as [`resolve_date_for_weekday`](Self::resolve_date_for_weekday)
    /// for a weekday given by name.
    pub fn resolve_named(
        &self,
        weekday: &str,
        reference: NaiveDateTime,
    ) -> Result<NaiveDate, CalendarError> {
        Ok(self.resolve_date_for_weekday(parse_weekday(weekday)?, reference))
    }

    /// Returns true once ordering for `weekday` of the current week is closed.
    pub fn is_ordering_window_closed(&self, weekday: Weekday, reference: NaiveDateTime) -> bool {
        self.is_date_closed(self.resolve_date_for_weekday(weekday, reference), reference)
    }

    /// Returns true if `date` is in the past, or is today and the cutoff
    /// hour has been reached.
    pub fn is_date_closed(&self, date: NaiveDate, reference: NaiveDateTime) -> bool {
        let today = reference.date();
        date < today || (date == today && reference.hour() >= self.cutoff_hour)
    }
}

impl Default for DayDateResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CUTOFF_HOUR)
    }
}
