//! Per-period effect table

use log::warn;

use crate::error::{AbsenceError, Result};
use crate::models::estimate::{EffectEstimate, EffectRow, PeriodOutcome};

/// One outcome per configured period, in configured order.
///
/// Built once by [`EffectTable::collect`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectTable {
    rows: Vec<PeriodOutcome>,
}

impl EffectTable {
    /// Arrange `outcomes` in the order of `labels`. A label with no outcome
    /// becomes a failed row so the table always has one row per period.
    #[must_use]
    pub fn collect(labels: &[String], outcomes: Vec<PeriodOutcome>) -> Self {
        let mut outcomes: Vec<Option<PeriodOutcome>> = outcomes.into_iter().map(Some).collect();
        let rows = labels
            .iter()
            .map(|label| {
                outcomes
                    .iter_mut()
                    .find(|o| o.as_ref().is_some_and(|o| o.label() == label))
                    .and_then(Option::take)
                    .unwrap_or_else(|| PeriodOutcome::Failed {
                        label: label.clone(),
                        message: "no estimate was produced".to_string(),
                    })
            })
            .collect();

        let unexpected: Vec<String> = outcomes.into_iter().flatten().map(|o| o.label().to_string()).collect();
        if !unexpected.is_empty() {
            warn!("Ignoring outcomes for unconfigured periods: {}", unexpected.join(", "));
        }

        Self { rows }
    }

    #[must_use]
    pub fn rows(&self) -> &[PeriodOutcome] {
        &self.rows
    }

    /// Estimate for one period, if it succeeded
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&EffectEstimate> {
        self.rows
            .iter()
            .find(|o| o.label() == label)
            .and_then(PeriodOutcome::estimate)
    }

    #[must_use]
    pub fn failed_periods(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|o| o.is_failed())
            .map(|o| o.label().to_string())
            .collect()
    }

    /// Fail with `IncompleteEstimates` if any period has no estimate
    pub fn ensure_complete(&self) -> Result<()> {
        let periods = self.failed_periods();
        if periods.is_empty() {
            Ok(())
        } else {
            Err(AbsenceError::IncompleteEstimates { periods })
        }
    }

    #[must_use]
    pub fn to_effect_rows(&self) -> Vec<EffectRow> {
        self.rows.iter().map(EffectRow::from).collect()
    }
}
