//! Regression design construction
//!
//! `FixedEffectLayout` enumerates state and month-of-year levels once over
//! the whole panel, so a column such as `state[36]` means the same thing in
//! every period's fit. Within a fit, the first level present is the
//! reference category and levels with no observations are removed and
//! reported rather than left as all-zero columns.

use std::collections::BTreeSet;
use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::models::cell::PanelRow;

/// One column of the design matrix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Regressor {
    Intercept,
    /// Parent-status indicator
    Parent,
    FemaleShare,
    CollegeShare,
    /// Indicator for a non-reference period (pooled model only)
    Period(String),
    /// Parent × period interaction (pooled model only)
    ParentPeriod(String),
    /// State fixed effect
    State(u16),
    /// Month-of-year fixed effect
    Month(u32),
}

impl Regressor {
    /// Value of this regressor for one panel row
    #[must_use]
    pub fn value(&self, row: &PanelRow) -> f64 {
        let indicator = |flag: bool| if flag { 1.0 } else { 0.0 };
        match self {
            Self::Intercept => 1.0,
            Self::Parent => indicator(row.parent_status),
            Self::FemaleShare => row.female_share,
            Self::CollegeShare => row.college_share,
            Self::Period(label) => indicator(&row.period_label == label),
            Self::ParentPeriod(label) => {
                indicator(row.parent_status && &row.period_label == label)
            }
            Self::State(state) => indicator(row.state == *state),
            Self::Month(month) => indicator(row.month == *month),
        }
    }
}

impl fmt::Display for Regressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intercept => write!(f, "intercept"),
            Self::Parent => write!(f, "parent"),
            Self::FemaleShare => write!(f, "female_share"),
            Self::CollegeShare => write!(f, "college_share"),
            Self::Period(label) => write!(f, "period[{label}]"),
            Self::ParentPeriod(label) => write!(f, "parent:period[{label}]"),
            Self::State(state) => write!(f, "state[{state}]"),
            Self::Month(month) => write!(f, "month[{month}]"),
        }
    }
}

/// Stable enumeration of fixed-effect levels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedEffectLayout {
    states: Vec<u16>,
    months: Vec<u32>,
}

impl FixedEffectLayout {
    /// Enumerate the levels present anywhere in the panel
    #[must_use]
    pub fn from_rows(rows: &[PanelRow]) -> Self {
        let states: BTreeSet<u16> = rows.iter().map(|r| r.state).collect();
        let months: BTreeSet<u32> = rows.iter().map(|r| r.month).collect();
        Self {
            states: states.into_iter().collect(),
            months: months.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn states(&self) -> &[u16] {
        &self.states
    }

    #[must_use]
    pub fn months(&self) -> &[u32] {
        &self.months
    }

    /// Dummy columns for `rows`, plus the labels of levels absent from them.
    ///
    /// The first level present in `rows` is the reference and gets no column.
    #[must_use]
    pub fn expand(&self, rows: &[&PanelRow]) -> (Vec<Regressor>, Vec<String>) {
        let present_states: BTreeSet<u16> = rows.iter().map(|r| r.state).collect();
        let present_months: BTreeSet<u32> = rows.iter().map(|r| r.month).collect();

        let mut columns = Vec::new();
        let mut absent = Vec::new();

        let mut reference_seen = false;
        for &state in &self.states {
            if !present_states.contains(&state) {
                absent.push(Regressor::State(state).to_string());
            } else if reference_seen {
                columns.push(Regressor::State(state));
            } else {
                reference_seen = true;
            }
        }

        let mut reference_seen = false;
        for &month in &self.months {
            if !present_months.contains(&month) {
                absent.push(Regressor::Month(month).to_string());
            } else if reference_seen {
                columns.push(Regressor::Month(month));
            } else {
                reference_seen = true;
            }
        }

        (columns, absent)
    }
}

/// A weighted regression problem ready to fit
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// Period label or model name
    pub label: String,
    pub columns: Vec<Regressor>,
    /// n × k regressors
    pub x: DMatrix<f64>,
    /// Outcome (cell rates)
    pub y: DVector<f64>,
    /// Cell denominators
    pub weights: DVector<f64>,
    /// State of each row, used as cluster id
    pub clusters: Vec<u64>,
    /// Fixed-effect levels of the layout with no rows here
    pub absent_levels: Vec<String>,
}

impl DesignMatrix {
    /// Assemble the design for `rows`.
    ///
    /// Column order: intercept, parent, covariates, `extra` (period terms),
    /// state dummies, month dummies.
    #[must_use]
    pub fn build(
        label: &str,
        rows: &[&PanelRow],
        layout: &FixedEffectLayout,
        include_covariates: bool,
        extra: Vec<Regressor>,
    ) -> Self {
        let mut columns = vec![Regressor::Intercept, Regressor::Parent];
        if include_covariates {
            columns.push(Regressor::FemaleShare);
            columns.push(Regressor::CollegeShare);
        }
        columns.extend(extra);
        let (fixed_effects, absent_levels) = layout.expand(rows);
        columns.extend(fixed_effects);

        let n = rows.len();
        let k = columns.len();
        let x = DMatrix::from_fn(n, k, |i, j| columns[j].value(rows[i]));
        let y = DVector::from_iterator(n, rows.iter().map(|r| r.rate));
        let weights = DVector::from_iterator(n, rows.iter().map(|r| r.denominator));
        let clusters = rows.iter().map(|r| u64::from(r.state)).collect();

        Self {
            label: label.to_string(),
            columns,
            x,
            y,
            weights,
            clusters,
            absent_levels,
        }
    }

    #[must_use]
    pub fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    #[must_use]
    pub fn n_params(&self) -> usize {
        self.x.ncols()
    }

    /// Index of a column, if present
    #[must_use]
    pub fn column_index(&self, regressor: &Regressor) -> Option<usize> {
        self.columns.iter().position(|c| c == regressor)
    }
}
