//! Difference-in-differences estimation on the cohort panel
//!
//! Each period gets its own weighted regression of the cell rate on a parent
//! indicator with state and month-of-year fixed effects. The coefficient on
//! the parent indicator is the period's parent/non-parent gap net of those
//! effects; comparing it across periods gives the DiD contrast.

use std::collections::BTreeSet;
use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::algorithm::design::{DesignMatrix, FixedEffectLayout, Regressor};
use crate::algorithm::wls::fit_wls;
use crate::config::AnalysisConfig;
use crate::error::{AbsenceError, Result};
use crate::models::cell::PanelRow;
use crate::models::estimate::{EffectEstimate, PeriodOutcome};

/// Per-period and pooled DiD fits over one panel
#[derive(Debug, Clone)]
pub struct DidEstimator {
    config: AnalysisConfig,
    layout: FixedEffectLayout,
}

impl DidEstimator {
    /// Prepare an estimator whose fixed-effect levels span the whole panel
    #[must_use]
    pub fn new(config: &AnalysisConfig, panel: &[PanelRow]) -> Self {
        let layout = FixedEffectLayout::from_rows(panel);
        debug!(
            "Fixed-effect layout: {} states, {} months",
            layout.states().len(),
            layout.months().len()
        );
        Self {
            config: config.clone(),
            layout,
        }
    }

    /// Fit the model for the rows labelled `label`
    pub fn estimate_period(&self, label: &str, panel: &[PanelRow]) -> Result<EffectEstimate> {
        let rows: Vec<&PanelRow> = panel.iter().filter(|r| r.period_label == label).collect();
        check_identification(label, &rows)?;

        let design = DesignMatrix::build(
            label,
            &rows,
            &self.layout,
            self.config.include_covariates,
            Vec::new(),
        );
        if !design.absent_levels.is_empty() {
            warn!(
                "Period {label}: dropping fixed-effect levels with no observations: {}",
                design.absent_levels.join(", ")
            );
        }

        self.coefficient(&design, &Regressor::Parent, label)
    }

    /// Fit every period in `labels`, preserving their order.
    /// A failure in one period does not affect the others.
    #[must_use]
    pub fn estimate_all(&self, labels: &[String], panel: &[PanelRow]) -> Vec<PeriodOutcome> {
        let start = Instant::now();
        info!("Estimating {} periods", labels.len());

        let outcomes: Vec<PeriodOutcome> = labels
            .par_iter()
            .map(|label| match self.estimate_period(label, panel) {
                Ok(estimate) => {
                    info!(
                        "Period {label}: parent effect {:.5} (se {:.5}, n={}, clusters={})",
                        estimate.coefficient, estimate.std_error, estimate.n, estimate.clusters
                    );
                    PeriodOutcome::Estimated(estimate)
                }
                Err(err) => {
                    warn!("Period {label} could not be estimated: {err}");
                    PeriodOutcome::Failed {
                        label: label.clone(),
                        message: err.to_string(),
                    }
                }
            })
            .collect();

        info!(
            "Estimated {} of {} periods in {:?}",
            outcomes.iter().filter(|o| !o.is_failed()).count(),
            labels.len(),
            start.elapsed()
        );
        outcomes
    }

    /// Pooled model with parent × period interactions.
    ///
    /// The first label is the reference period; each later period gets a
    /// period indicator and a parent interaction, and the interaction
    /// estimates are returned labelled `parent:period[<label>]`.
    pub fn estimate_pooled(&self, labels: &[String], panel: &[PanelRow]) -> Result<Vec<EffectEstimate>> {
        let rows: Vec<&PanelRow> = panel
            .iter()
            .filter(|r| labels.contains(&r.period_label))
            .collect();
        check_identification("pooled", &rows)?;

        let present: BTreeSet<&str> = rows.iter().map(|r| r.period_label.as_str()).collect();
        let later: Vec<&String> = labels
            .iter()
            .skip(1)
            .filter(|label| present.contains(label.as_str()))
            .collect();
        if labels.first().is_none_or(|first| !present.contains(first.as_str())) {
            return Err(AbsenceError::insufficient_data(
                "pooled",
                "the reference period has no cells",
            ));
        }

        let mut extra: Vec<Regressor> = later.iter().map(|l| Regressor::Period((*l).clone())).collect();
        extra.extend(later.iter().map(|l| Regressor::ParentPeriod((*l).clone())));

        let design = DesignMatrix::build(
            "pooled",
            &rows,
            &self.layout,
            self.config.include_covariates,
            extra,
        );

        later
            .iter()
            .map(|label| {
                let term = Regressor::ParentPeriod((*label).clone());
                self.coefficient(&design, &term, "pooled")
            })
            .collect()
    }

    fn coefficient(&self, design: &DesignMatrix, term: &Regressor, context: &str) -> Result<EffectEstimate> {
        let fit = fit_wls(design, self.config.cluster_se_by)?;
        let j = design.column_index(term).ok_or_else(|| {
            AbsenceError::insufficient_data(context, format!("column {term} is not in the design"))
        })?;
        let (ci_low, ci_high) = fit.confidence_interval(j, self.config.confidence_level)?;

        let label = match term {
            Regressor::Parent => design.label.clone(),
            other => other.to_string(),
        };
        Ok(EffectEstimate {
            label,
            coefficient: fit.coefficients[j],
            std_error: fit.std_error(j),
            ci_low,
            ci_high,
            n: fit.n_obs,
            clusters: fit.clusters,
            r_squared: fit.r_squared,
            se_policy: fit.policy,
            absent_levels: design.absent_levels.clone(),
        })
    }
}

/// Reject samples on which the parent effect cannot be identified
fn check_identification(label: &str, rows: &[&PanelRow]) -> Result<()> {
    if rows.is_empty() {
        return Err(AbsenceError::insufficient_data(label, "no cells in this period"));
    }

    let states: BTreeSet<u16> = rows.iter().map(|r| r.state).collect();
    if states.len() < 2 {
        return Err(AbsenceError::insufficient_data(
            label,
            format!(
                "state effects need at least 2 states, found {}",
                states.len()
            ),
        ));
    }

    let parents = rows.iter().filter(|r| r.parent_status).count();
    if parents == 0 || parents == rows.len() {
        return Err(AbsenceError::insufficient_data(
            label,
            "parent status does not vary",
        ));
    }
    Ok(())
}
