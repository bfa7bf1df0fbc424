//! Cohort cells and panel rows
//!
//! Weights are accumulated in fixed-point units of 1e-4 (the precision of
//! the published CPS final weights). Integer addition keeps accumulation
//! exact, so merging partial accumulators in any order gives identical cells.

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use serde::{Deserialize, Serialize};

use crate::models::period::YearMonth;
use crate::models::types::{EducationGroup, Sex};

/// Fixed-point units per unit of survey weight
pub const WEIGHT_SCALE: f64 = 10_000.0;

/// Convert a validated (finite, non-negative) weight to fixed-point units
#[must_use]
pub fn weight_units(weight: f64) -> u128 {
    (weight * WEIGHT_SCALE).round() as u128
}

/// Convert fixed-point units back to a weight
#[must_use]
pub fn units_to_weight(units: u128) -> f64 {
    units as f64 / WEIGHT_SCALE
}

/// Value of the optional stratifier for a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stratum {
    Sex(Sex),
    Education(EducationGroup),
}

impl fmt::Display for Stratum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sex(sex) => write!(f, "{sex}"),
            Self::Education(group) => write!(f, "{group}"),
        }
    }
}

/// Aggregation key. Field order defines the panel sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub period: YearMonth,
    pub is_parent: bool,
    pub stratum: Option<Stratum>,
    pub state: u16,
}

/// Accumulated weights for one key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellTotals {
    /// Illness-absent eligible weight
    pub numerator: u128,
    /// Eligible weight
    pub denominator: u128,
    /// Eligible weight of women
    pub female: u128,
    /// Eligible weight with a bachelor's degree or higher
    pub college: u128,
    /// Unweighted eligible records
    pub records: u64,
}

impl CellTotals {
    /// Add another accumulator into this one
    pub fn absorb(&mut self, other: &Self) {
        self.numerator += other.numerator;
        self.denominator += other.denominator;
        self.female += other.female;
        self.college += other.college;
        self.records += other.records;
    }
}

/// One (time, group) combination with its accumulated weights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortCell {
    pub key: CellKey,
    pub totals: CellTotals,
}

impl CohortCell {
    #[must_use]
    pub fn numerator(&self) -> f64 {
        units_to_weight(self.totals.numerator)
    }

    #[must_use]
    pub fn denominator(&self) -> f64 {
        units_to_weight(self.totals.denominator)
    }

    /// Weighted illness-absence rate, `None` for an empty denominator
    #[must_use]
    pub fn rate(&self) -> Option<f64> {
        (self.totals.denominator > 0)
            .then(|| self.totals.numerator as f64 / self.totals.denominator as f64)
    }

    #[must_use]
    pub fn female_share(&self) -> Option<f64> {
        (self.totals.denominator > 0)
            .then(|| self.totals.female as f64 / self.totals.denominator as f64)
    }

    #[must_use]
    pub fn college_share(&self) -> Option<f64> {
        (self.totals.denominator > 0)
            .then(|| self.totals.college as f64 / self.totals.denominator as f64)
    }
}

/// A cohort cell resolved to a rate and tagged with its analysis period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    pub year: i32,
    pub month: u32,
    pub parent_status: bool,
    pub state: u16,
    pub stratum: Option<String>,
    pub numerator: f64,
    pub denominator: f64,
    pub rate: f64,
    pub records: u64,
    pub female_share: f64,
    pub college_share: f64,
    pub period_label: String,
}

impl PanelRow {
    /// Resolve a cell. Returns `None` when the denominator is zero.
    #[must_use]
    pub fn from_cell(cell: &CohortCell, period_label: &str) -> Option<Self> {
        let rate = cell.rate()?;
        Some(Self {
            year: cell.key.period.year,
            month: cell.key.period.month,
            parent_status: cell.key.is_parent,
            state: cell.key.state,
            stratum: cell.key.stratum.map(|s| s.to_string()),
            numerator: cell.numerator(),
            denominator: cell.denominator(),
            rate,
            records: cell.totals.records,
            female_share: cell.female_share().unwrap_or(0.0),
            college_share: cell.college_share().unwrap_or(0.0),
            period_label: period_label.to_string(),
        })
    }

    #[must_use]
    pub const fn year_month(&self) -> YearMonth {
        YearMonth {
            year: self.year,
            month: self.month,
        }
    }

    /// Arrow fields of the panel artifact
    #[must_use]
    pub fn fields() -> Vec<FieldRef> {
        vec![
            Arc::new(Field::new("year", DataType::Int32, false)),
            Arc::new(Field::new("month", DataType::UInt32, false)),
            Arc::new(Field::new("parent_status", DataType::Boolean, false)),
            Arc::new(Field::new("state", DataType::UInt16, false)),
            Arc::new(Field::new("stratum", DataType::Utf8, true)),
            Arc::new(Field::new("numerator", DataType::Float64, false)),
            Arc::new(Field::new("denominator", DataType::Float64, false)),
            Arc::new(Field::new("rate", DataType::Float64, false)),
            Arc::new(Field::new("records", DataType::UInt64, false)),
            Arc::new(Field::new("female_share", DataType::Float64, false)),
            Arc::new(Field::new("college_share", DataType::Float64, false)),
            Arc::new(Field::new("period_label", DataType::Utf8, false)),
        ]
    }

    #[must_use]
    pub fn schema() -> Schema {
        Schema::new(Self::fields())
    }
}
