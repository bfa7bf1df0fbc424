//! Streaming aggregation of classified records into cohort cells
//!
//! The aggregator keeps one `CellTotals` per distinct key, so memory grows
//! with the number of cells rather than the number of records. Partial
//! aggregators built over disjoint slices of the input (row groups, months,
//! threads) combine with `merge`; totals are integers, so the result does not
//! depend on merge order.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::algorithm::classify::RecordClassifier;
use crate::algorithm::periods::PeriodSplitter;
use crate::config::StratifyBy;
use crate::error::{AbsenceError, Result};
use crate::models::cell::{CellKey, CellTotals, CohortCell, PanelRow, Stratum, weight_units};
use crate::models::period::YearMonth;
use crate::models::record::{ClassifiedRecord, RawRecord};
use crate::models::types::Sex;

/// Invalid records logged at `warn` before switching to `debug`
const INVALID_WARN_LIMIT: u64 = 20;

/// Counts of records seen by an aggregator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    /// Records offered to the aggregator, valid or not
    pub read: u64,
    /// Valid, eligible records added to a cell
    pub eligible: u64,
    /// Valid records excluded as ineligible
    pub ineligible: u64,
    /// Invalid records skipped, by offending field
    pub invalid_by_field: BTreeMap<String, u64>,
}

impl RecordCounts {
    #[must_use]
    pub fn invalid(&self) -> u64 {
        self.invalid_by_field.values().sum()
    }

    fn absorb(&mut self, other: &Self) {
        self.read += other.read;
        self.eligible += other.eligible;
        self.ineligible += other.ineligible;
        for (field, count) in &other.invalid_by_field {
            *self.invalid_by_field.entry(field.clone()).or_insert(0) += count;
        }
    }
}

/// Single-pass accumulator of cohort cells
#[derive(Debug, Clone)]
pub struct PanelAggregator {
    stratify_by: StratifyBy,
    cells: FxHashMap<CellKey, CellTotals>,
    /// Months of every valid record, eligible or not
    months: BTreeSet<YearMonth>,
    counts: RecordCounts,
}

impl PanelAggregator {
    #[must_use]
    pub fn new(stratify_by: StratifyBy) -> Self {
        Self {
            stratify_by,
            cells: FxHashMap::default(),
            months: BTreeSet::new(),
            counts: RecordCounts::default(),
        }
    }

    /// Cell key for a record under the active stratifier
    #[must_use]
    pub fn key_for(&self, record: &ClassifiedRecord) -> CellKey {
        let stratum = match self.stratify_by {
            StratifyBy::Pooled => None,
            StratifyBy::Sex => Some(Stratum::Sex(record.sex)),
            StratifyBy::Education => Some(Stratum::Education(record.education)),
        };
        CellKey {
            period: record.period,
            is_parent: record.is_parent,
            stratum,
            state: record.state,
        }
    }

    /// Add a classified record. Ineligible records touch no cell.
    pub fn push(&mut self, record: &ClassifiedRecord) {
        self.counts.read += 1;
        self.months.insert(record.period);
        if !record.is_eligible {
            self.counts.ineligible += 1;
            return;
        }
        self.counts.eligible += 1;

        let key = self.key_for(record);
        let units = weight_units(record.weight);
        let totals = self.cells.entry(key).or_default();
        totals.denominator += units;
        if record.is_absent_illness {
            totals.numerator += units;
        }
        if record.sex == Sex::Female {
            totals.female += units;
        }
        if record.education.is_college() {
            totals.college += units;
        }
        totals.records += 1;
    }

    /// Classify and add a raw record, counting it if it is invalid
    pub fn push_raw(&mut self, classifier: &RecordClassifier, raw: &RawRecord) {
        match classifier.classify(raw) {
            Ok(record) => self.push(&record),
            Err(err) => self.record_invalid(&err),
        }
    }

    /// Count an invalid record. Non-record errors are ignored here.
    pub fn record_invalid(&mut self, err: &AbsenceError) {
        if let AbsenceError::InvalidRecord { field, .. } = err {
            self.counts.read += 1;
            let count = self
                .counts
                .invalid_by_field
                .entry((*field).to_string())
                .or_insert(0);
            *count += 1;
            if self.counts.invalid() <= INVALID_WARN_LIMIT {
                warn!("Skipping {err}");
            } else {
                debug!("Skipping {err}");
            }
        }
    }

    /// Combine two partial aggregators built with the same stratifier
    #[must_use]
    pub fn merge(mut self, mut other: Self) -> Self {
        debug_assert_eq!(self.stratify_by, other.stratify_by);
        if other.cells.len() > self.cells.len() {
            std::mem::swap(&mut self.cells, &mut other.cells);
        }
        for (key, totals) in &other.cells {
            self.cells.entry(*key).or_default().absorb(totals);
        }
        self.months.append(&mut other.months);
        self.counts.absorb(&other.counts);
        self
    }

    #[must_use]
    pub const fn counts(&self) -> &RecordCounts {
        &self.counts
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Sorted non-empty cells plus the number of zero-weight cells dropped
    #[must_use]
    pub fn finish(self) -> AggregationOutput {
        let mut empty_cells = 0usize;
        let cells: Vec<CohortCell> = self
            .cells
            .into_iter()
            .sorted_unstable_by_key(|(key, _)| *key)
            .filter_map(|(key, totals)| {
                if totals.denominator == 0 {
                    warn!(
                        "Dropping cell {} parent={} state={} with zero eligible weight ({} records)",
                        key.period, key.is_parent, key.state, totals.records
                    );
                    empty_cells += 1;
                    None
                } else {
                    Some(CohortCell { key, totals })
                }
            })
            .collect();

        info!(
            "Aggregated {} eligible records into {} cells ({} empty cells dropped)",
            self.counts.eligible,
            cells.len(),
            empty_cells
        );

        AggregationOutput {
            cells,
            months: self.months,
            empty_cells,
            counts: self.counts,
        }
    }
}

/// Result of aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationOutput {
    /// Cells sorted by key
    pub cells: Vec<CohortCell>,
    /// Months seen on valid records, including ineligible and zero-weight ones
    pub months: BTreeSet<YearMonth>,
    /// Cells dropped for a zero denominator
    pub empty_cells: usize,
    pub counts: RecordCounts,
}

impl AggregationOutput {
    /// Resolve every cell to a panel row tagged with its period.
    /// Any valid record dated outside every window aborts with
    /// `UnboundedDate`, whether or not it reached a cell.
    pub fn to_panel(&self, splitter: &PeriodSplitter) -> Result<Vec<PanelRow>> {
        for month in &self.months {
            splitter.label_for(*month)?;
        }
        self.cells
            .iter()
            .filter_map(|cell| {
                let label = match splitter.label_for(cell.key.period) {
                    Ok(label) => label,
                    Err(err) => return Some(Err(err)),
                };
                PanelRow::from_cell(cell, label).map(Ok)
            })
            .collect()
    }
}

/// Aggregate an in-memory or streamed sequence of classified records
pub fn aggregate<'a, I>(records: I, stratify_by: StratifyBy) -> AggregationOutput
where
    I: IntoIterator<Item = &'a ClassifiedRecord>,
{
    let mut aggregator = PanelAggregator::new(stratify_by);
    for record in records {
        aggregator.push(record);
    }
    aggregator.finish()
}
