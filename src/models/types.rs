//! Common domain type definitions
//!
//! Coded demographic categories shared by records, cells and the
//! regression covariates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sex of the respondent (`SEX`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    /// Code 1
    Male,
    /// Code 2
    Female,
    /// Code 9 (NIU)
    Unknown,
}

impl From<i64> for Sex {
    fn from(value: i64) -> Self {
        match value {
            1 => Self::Male,
            2 => Self::Female,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => write!(f, "male"),
            Self::Female => write!(f, "female"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Educational attainment collapsed from the detailed `EDUC` code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationGroup {
    /// Codes 2-72: no high school diploma
    LessThanHighSchool,
    /// Code 73: high school diploma or equivalent
    HighSchool,
    /// Codes 74-110: some college or associate degree
    SomeCollege,
    /// Codes 111-125: bachelor's degree or higher
    College,
    /// NIU, blank or missing
    Unknown,
}

impl EducationGroup {
    /// Whether the group holds at least a bachelor's degree
    #[must_use]
    pub const fn is_college(self) -> bool {
        matches!(self, Self::College)
    }
}

impl From<i64> for EducationGroup {
    fn from(value: i64) -> Self {
        match value {
            2..=72 => Self::LessThanHighSchool,
            73 => Self::HighSchool,
            74..=110 => Self::SomeCollege,
            111..=125 => Self::College,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for EducationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LessThanHighSchool => write!(f, "less_than_high_school"),
            Self::HighSchool => write!(f, "high_school"),
            Self::SomeCollege => write!(f, "some_college"),
            Self::College => write!(f, "college"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
