//! YearMonth — the single calendar unit every series is normalized onto.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A calendar month. Ordered chronologically; serialized as `"YYYY-MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonthParseError {
    #[error("month {month} out of range 1..=12 (year {year})")]
    OutOfRange { year: i32, month: u32 },
    #[error("invalid month literal '{0}': expected YYYY-MM")]
    Malformed(String),
}

impl YearMonth {
    /// Build a month, rejecting anything outside 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self, MonthParseError> {
        if (1..=12).contains(&month) {
            Ok(Self { year, month })
        } else {
            Err(MonthParseError::OutOfRange { year, month })
        }
    }

    /// January of `year`.
    pub const fn first_of_year(year: i32) -> Self {
        Self { year, month: 1 }
    }

    /// December of `year`.
    pub const fn last_of_year(year: i32) -> Self {
        Self { year, month: 12 }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Months since year 0, used for offset arithmetic.
    fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: (ordinal.rem_euclid(12) + 1) as u32,
        }
    }

    /// Shift by `n` months (negative moves backwards).
    pub fn offset(&self, n: i64) -> Self {
        Self::from_ordinal(self.ordinal() + n)
    }

    pub fn succ(&self) -> Self {
        self.offset(1)
    }

    pub fn pred(&self) -> Self {
        self.offset(-1)
    }

    /// Signed number of months from `self` to `other` (`other - self`).
    pub fn months_until(&self, other: YearMonth) -> i64 {
        other.ordinal() - self.ordinal()
    }

    /// Inclusive month range `start..=end`; empty when `end < start`.
    pub fn range_inclusive(start: YearMonth, end: YearMonth) -> Vec<YearMonth> {
        let span = start.months_until(end);
        if span < 0 {
            return Vec::new();
        }
        (0..=span).map(|i| start.offset(i)).collect()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = MonthParseError;

    /// Accepts `YYYY-MM` and `YYYY-MM-DD` (the day is ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut parts = trimmed.split('-');
        let (Some(y), Some(m)) = (parts.next(), parts.next()) else {
            return Err(MonthParseError::Malformed(s.to_string()));
        };
        if parts.count() > 1 || y.len() != 4 {
            return Err(MonthParseError::Malformed(s.to_string()));
        }
        let year: i32 = y
            .parse()
            .map_err(|_| MonthParseError::Malformed(s.to_string()))?;
        let month: u32 = m
            .parse()
            .map_err(|_| MonthParseError::Malformed(s.to_string()))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = MonthParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}
