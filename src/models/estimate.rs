//! Regression estimates and their tabular form

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use serde::{Deserialize, Serialize};

use crate::config::ClusterBy;

/// Estimate of one coefficient from one fitted model
#[derive(Debug, Clone, PartialEq)]
pub struct EffectEstimate {
    /// Period label, or interaction term for pooled estimates
    pub label: String,
    pub coefficient: f64,
    pub std_error: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    /// Cells used in the fit
    pub n: usize,
    /// Clusters behind the standard error (cells when unclustered)
    pub clusters: usize,
    pub r_squared: f64,
    pub se_policy: ClusterBy,
    /// Fixed-effect levels with no observations in this fit
    pub absent_levels: Vec<String>,
}

/// Outcome of estimating one period
#[derive(Debug, Clone, PartialEq)]
pub enum PeriodOutcome {
    Estimated(EffectEstimate),
    Failed { label: String, message: String },
}

impl PeriodOutcome {
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Estimated(estimate) => &estimate.label,
            Self::Failed { label, .. } => label,
        }
    }

    #[must_use]
    pub const fn estimate(&self) -> Option<&EffectEstimate> {
        match self {
            Self::Estimated(estimate) => Some(estimate),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Row of the effects artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectRow {
    pub period: String,
    pub status: String,
    pub coefficient: Option<f64>,
    pub std_error: Option<f64>,
    pub ci_low: Option<f64>,
    pub ci_high: Option<f64>,
    pub n: Option<u64>,
    pub clusters: Option<u64>,
    pub r_squared: Option<f64>,
    pub se_policy: Option<String>,
    pub message: Option<String>,
}

impl From<&PeriodOutcome> for EffectRow {
    fn from(outcome: &PeriodOutcome) -> Self {
        match outcome {
            PeriodOutcome::Estimated(e) => Self {
                period: e.label.clone(),
                status: "estimated".to_string(),
                coefficient: Some(e.coefficient),
                std_error: Some(e.std_error),
                ci_low: Some(e.ci_low),
                ci_high: Some(e.ci_high),
                n: Some(e.n as u64),
                clusters: Some(e.clusters as u64),
                r_squared: Some(e.r_squared),
                se_policy: Some(e.se_policy.as_str().to_string()),
                message: (!e.absent_levels.is_empty())
                    .then(|| format!("absent levels: {}", e.absent_levels.join(" "))),
            },
            PeriodOutcome::Failed { label, message } => Self {
                period: label.clone(),
                status: "failed".to_string(),
                coefficient: None,
                std_error: None,
                ci_low: None,
                ci_high: None,
                n: None,
                clusters: None,
                r_squared: None,
                se_policy: None,
                message: Some(message.clone()),
            },
        }
    }
}

impl EffectRow {
    /// Arrow fields of the effects artifact
    #[must_use]
    pub fn fields() -> Vec<FieldRef> {
        vec![
            Arc::new(Field::new("period", DataType::Utf8, false)),
            Arc::new(Field::new("status", DataType::Utf8, false)),
            Arc::new(Field::new("coefficient", DataType::Float64, true)),
            Arc::new(Field::new("std_error", DataType::Float64, true)),
            Arc::new(Field::new("ci_low", DataType::Float64, true)),
            Arc::new(Field::new("ci_high", DataType::Float64, true)),
            Arc::new(Field::new("n", DataType::UInt64, true)),
            Arc::new(Field::new("clusters", DataType::UInt64, true)),
            Arc::new(Field::new("r_squared", DataType::Float64, true)),
            Arc::new(Field::new("se_policy", DataType::Utf8, true)),
            Arc::new(Field::new("message", DataType::Utf8, true)),
        ]
    }

    #[must_use]
    pub fn schema() -> Schema {
        Schema::new(Self::fields())
    }
}
