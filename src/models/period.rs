//! Calendar months and analysis windows

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AbsenceError, Result};

/// A calendar month, ordered chronologically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// The following calendar month
    #[must_use]
    pub const fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl From<NaiveDate> for YearMonth {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl FromStr for YearMonth {
    type Err = AbsenceError;

    fn from_str(s: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
            .map_err(|e| AbsenceError::InvalidConfig(format!("'{s}' is not YYYY-MM: {e}")))?;
        Ok(Self::from(date))
    }
}

impl TryFrom<String> for YearMonth {
    type Error = AbsenceError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A named, inclusive calendar window. `end: None` is open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub label: String,
    pub start: YearMonth,
    #[serde(default)]
    pub end: Option<YearMonth>,
}

impl PeriodWindow {
    pub fn new(label: impl Into<String>, start: YearMonth, end: Option<YearMonth>) -> Self {
        Self {
            label: label.into(),
            start,
            end,
        }
    }

    /// Whether the month falls inside this window
    #[must_use]
    pub fn contains(&self, ym: YearMonth) -> bool {
        ym >= self.start && self.end.is_none_or(|end| ym <= end)
    }
}

impl fmt::Display for PeriodWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}: {}..{}", self.label, self.start, end),
            None => write!(f, "{}: {}..present", self.label, self.start),
        }
    }
}
