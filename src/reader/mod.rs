//! Microdata reader
//!
//! Streams a CPS extract stored as Parquet through the classifier and
//! aggregator. Row groups are independent units of work: each one is read
//! with its own reader into its own `PanelAggregator`, and the partial
//! aggregators are merged at the end. Only one batch per worker is resident
//! at a time.

use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use log::{debug, info};
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rayon::prelude::*;

use crate::algorithm::aggregate::{AggregationOutput, PanelAggregator};
use crate::algorithm::classify::RecordClassifier;
use crate::config::{AnalysisConfig, StratifyBy};
use crate::error::util::safe_open_file;
use crate::error::{AbsenceError, Result};
use crate::models::record::{RawRecord, columns};
use crate::utils::arrow::{CodeValue, code_values, float64_values};
use crate::utils::logging::{
    create_main_progress_bar, finish_progress_bar, log_operation_complete, log_operation_start,
};

/// Every column the classifier reads
fn required_columns() -> impl Iterator<Item = &'static str> {
    columns::CODED.into_iter().chain(std::iter::once(columns::WEIGHT))
}

/// Parquet microdata source with validated columns
#[derive(Debug, Clone)]
pub struct MicrodataReader {
    path: PathBuf,
    batch_size: usize,
    /// Root column indices of the required columns
    projection: Vec<usize>,
    /// (first row index, row count) for each row group
    row_groups: Vec<(u64, u64)>,
}

impl MicrodataReader {
    /// Open `path` and check that every required column is present
    pub fn open(path: &Path, batch_size: usize) -> Result<Self> {
        let file = safe_open_file(path, "microdata")?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

        let schema = builder.schema();
        let missing: Vec<&str> = required_columns()
            .filter(|name| schema.index_of(name).is_err())
            .collect();
        if !missing.is_empty() {
            return Err(AbsenceError::Schema(format!(
                "{} is missing required columns: {}",
                path.display(),
                missing.join(", ")
            )));
        }
        let mut projection: Vec<usize> = required_columns()
            .filter_map(|name| schema.index_of(name).ok())
            .collect();
        projection.sort_unstable();

        let mut first_row = 0u64;
        let row_groups = builder
            .metadata()
            .row_groups()
            .iter()
            .map(|group| {
                let rows = u64::try_from(group.num_rows()).unwrap_or(0);
                let span = (first_row, rows);
                first_row += rows;
                span
            })
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            batch_size,
            projection,
            row_groups,
        })
    }

    #[must_use]
    pub fn row_group_count(&self) -> usize {
        self.row_groups.len()
    }

    /// Rows in the file according to its metadata
    #[must_use]
    pub fn row_count(&self) -> u64 {
        self.row_groups.iter().map(|(_, rows)| rows).sum()
    }

    /// Classify and aggregate one row group
    pub fn aggregate_row_group(
        &self,
        index: usize,
        classifier: &RecordClassifier,
        stratify_by: StratifyBy,
    ) -> Result<PanelAggregator> {
        let (mut next_row, _) = self.row_groups.get(index).copied().ok_or_else(|| {
            AbsenceError::Schema(format!(
                "row group {index} does not exist in {}",
                self.path.display()
            ))
        })?;

        let file = safe_open_file(&self.path, "microdata")?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), self.projection.iter().copied());
        let reader = builder
            .with_row_groups(vec![index])
            .with_projection(mask)
            .with_batch_size(self.batch_size)
            .build()?;

        let mut aggregator = PanelAggregator::new(stratify_by);
        for batch in reader {
            let batch = batch?;
            aggregate_batch(&mut aggregator, classifier, &batch, next_row)?;
            next_row += batch.num_rows() as u64;
        }
        debug!(
            "Row group {index}: {} cells after {} records",
            aggregator.cell_count(),
            aggregator.counts().read
        );
        Ok(aggregator)
    }

    /// Aggregate every row group on a pool of `config.worker_threads()`
    pub fn aggregate(&self, config: &AnalysisConfig) -> Result<AggregationOutput> {
        let start = Instant::now();
        log_operation_start("Aggregating microdata from", &self.path);

        let classifier = RecordClassifier::new(config);
        let stratify_by = config.stratify_by;
        let pool = config.thread_pool()?;

        let pb = create_main_progress_bar(self.row_group_count() as u64, Some("row groups"));
        let merged = pool.install(|| {
            (0..self.row_group_count())
                .into_par_iter()
                .map(|index| {
                    let partial = self.aggregate_row_group(index, &classifier, stratify_by);
                    pb.inc(1);
                    partial
                })
                .try_reduce(|| PanelAggregator::new(stratify_by), |a, b| Ok(a.merge(b)))
        })?;
        finish_progress_bar(&pb, Some("aggregation complete"));

        let counts = merged.counts();
        info!(
            "Read {} records: {} eligible, {} ineligible, {} invalid",
            counts.read,
            counts.eligible,
            counts.ineligible,
            counts.invalid()
        );
        let read = usize::try_from(counts.read).unwrap_or(usize::MAX);
        log_operation_complete("aggregated", &self.path, read, Some(start.elapsed()));
        Ok(merged.finish())
    }
}

/// Raw records for one batch; `first_row` is the source index of its first row
pub fn records_from_batch(batch: &RecordBatch, first_row: u64) -> Result<Vec<RawRecord>> {
    let coded: Vec<Vec<CodeValue>> = columns::CODED
        .iter()
        .map(|name| code_values(batch, name))
        .collect::<Result<_>>()?;
    let weights = float64_values(batch, columns::WEIGHT)?;

    Ok((0..batch.num_rows())
        .map(|i| {
            let mut code = [None; columns::CODED.len()];
            let mut malformed = None;
            for (c, column) in coded.iter().enumerate() {
                match column[i] {
                    Ok(value) => code[c] = value,
                    Err(value) => {
                        malformed.get_or_insert((columns::CODED[c], value));
                    }
                }
            }
            RawRecord {
                row: first_row + i as u64,
                year: code[0],
                month: code[1],
                state: code[2],
                age: code[3],
                sex: code[4],
                education: code[5],
                employment_status: code[6],
                usual_hours: code[7],
                class_of_worker: code[8],
                absent: code[9],
                absence_reason: code[10],
                child_count: code[11],
                child_under5_count: code[12],
                mother_link: code[13],
                father_link: code[14],
                weight: weights[i],
                malformed,
            }
        })
        .collect())
}

/// Feed one batch through the classifier into `aggregator`
pub fn aggregate_batch(
    aggregator: &mut PanelAggregator,
    classifier: &RecordClassifier,
    batch: &RecordBatch,
    first_row: u64,
) -> Result<()> {
    for raw in records_from_batch(batch, first_row)? {
        aggregator.push_raw(classifier, &raw);
    }
    Ok(())
}
