//! Configuration for a panel build and estimation run.
//!
//! A single `AnalysisConfig` value is created once per run and passed by
//! reference to every stage; nothing reads settings from global state.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::algorithm::periods::PeriodSplitter;
use crate::error::util::safe_read_to_string;
use crate::error::{AbsenceError, Result};
use crate::models::period::{PeriodWindow, YearMonth};

/// Default number of rows per Arrow batch when reading microdata
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// `WHYABSNT` code for own illness, injury or medical problems
pub const OWN_ILLNESS_REASON_CODE: i64 = 8;

/// Which survey items define a respondent as a parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentDefinition {
    /// Any own child in the household (`NCHILD > 0`)
    #[serde(rename = "any_child")]
    AnyChild,
    /// A mother/father pointer is set and an own child is co-resident
    #[serde(rename = "coresident_link")]
    CoresidentLink,
    /// At least one own child under five (`NCHLT5 > 0`)
    #[serde(rename = "child_under5")]
    ChildUnder5,
}

impl ParentDefinition {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AnyChild => "any_child",
            Self::CoresidentLink => "coresident_link",
            Self::ChildUnder5 => "child_under5",
        }
    }
}

impl fmt::Display for ParentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard-error policy for the regression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterBy {
    /// Cluster-robust errors with states as clusters
    #[serde(rename = "state")]
    State,
    /// HC1 heteroskedasticity-robust errors, no clustering
    #[serde(rename = "none")]
    Unclustered,
}

impl ClusterBy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::State => "cluster_state",
            Self::Unclustered => "hc1",
        }
    }
}

impl fmt::Display for ClusterBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional extra dimension of the cohort cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StratifyBy {
    #[serde(rename = "none")]
    Pooled,
    #[serde(rename = "sex")]
    Sex,
    #[serde(rename = "education")]
    Education,
}

impl fmt::Display for StratifyBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pooled => write!(f, "none"),
            Self::Sex => write!(f, "sex"),
            Self::Education => write!(f, "education"),
        }
    }
}

/// Configuration for a panel build and estimation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Parent definition applied to every record
    pub parent_definition: ParentDefinition,
    /// Inclusive age range of eligible workers
    pub eligible_age_range: (u16, u16),
    /// Ordered, contiguous analysis windows
    pub period_boundaries: Vec<PeriodWindow>,
    /// Standard-error policy
    pub cluster_se_by: ClusterBy,
    /// Extra cell dimension
    pub stratify_by: StratifyBy,
    /// `WHYABSNT` codes counted as own-illness absence
    pub illness_reason_codes: Vec<i64>,
    /// Add female and college shares as regressors
    pub include_covariates: bool,
    /// Confidence level for reported intervals
    pub confidence_level: f64,
    /// Rows per Arrow batch when reading microdata
    pub batch_size: usize,
    /// Worker threads for aggregation and estimation (0 = all cores)
    pub threads: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            parent_definition: ParentDefinition::AnyChild,
            eligible_age_range: (25, 49),
            period_boundaries: default_periods(),
            cluster_se_by: ClusterBy::State,
            stratify_by: StratifyBy::Pooled,
            illness_reason_codes: vec![OWN_ILLNESS_REASON_CODE],
            include_covariates: true,
            confidence_level: 0.95,
            batch_size: DEFAULT_BATCH_SIZE,
            threads: 1,
        }
    }
}

/// P1 1994-2007, P2 2008-2019, P3 2020 onwards
#[must_use]
pub fn default_periods() -> Vec<PeriodWindow> {
    vec![
        PeriodWindow::new(
            "P1",
            YearMonth { year: 1994, month: 1 },
            Some(YearMonth { year: 2007, month: 12 }),
        ),
        PeriodWindow::new(
            "P2",
            YearMonth { year: 2008, month: 1 },
            Some(YearMonth { year: 2019, month: 12 }),
        ),
        PeriodWindow::new("P3", YearMonth { year: 2020, month: 1 }, None),
    ]
}

impl AnalysisConfig {
    /// Load and validate a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = safe_read_to_string(path, "analysis configuration")?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let (min_age, max_age) = self.eligible_age_range;
        if min_age > max_age {
            return Err(AbsenceError::InvalidConfig(format!(
                "eligible_age_range [{min_age}, {max_age}] is empty"
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(AbsenceError::InvalidConfig(format!(
                "confidence_level {} must lie strictly between 0 and 1",
                self.confidence_level
            )));
        }
        if self.illness_reason_codes.is_empty() {
            return Err(AbsenceError::InvalidConfig(
                "illness_reason_codes must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AbsenceError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        PeriodSplitter::new(&self.period_boundaries)?;
        Ok(())
    }

    /// Resolved worker count
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    /// Rayon pool sized to `worker_threads`, shared by aggregation and estimation
    pub fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_threads())
            .build()
            .map_err(|e| AbsenceError::InvalidConfig(format!("cannot start worker pool: {e}")))
    }
}

impl fmt::Display for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Analysis Configuration:")?;
        writeln!(f, "  Parent Definition: {}", self.parent_definition)?;
        writeln!(
            f,
            "  Eligible Ages: {}-{}",
            self.eligible_age_range.0, self.eligible_age_range.1
        )?;
        for window in &self.period_boundaries {
            writeln!(f, "  Period {window}")?;
        }
        writeln!(f, "  Standard Errors: {}", self.cluster_se_by)?;
        writeln!(f, "  Stratify By: {}", self.stratify_by)?;
        writeln!(f, "  Illness Reason Codes: {:?}", self.illness_reason_codes)?;
        writeln!(f, "  Covariates: {}", self.include_covariates)?;
        writeln!(f, "  Confidence Level: {}", self.confidence_level)?;
        Ok(())
    }
}
