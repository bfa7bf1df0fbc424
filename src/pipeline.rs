//! End-to-end stages: microdata to panel, panel to estimates, and both

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};
use serde::Serialize;

use crate::algorithm::aggregate::{AggregationOutput, RecordCounts};
use crate::algorithm::did::DidEstimator;
use crate::algorithm::periods::PeriodSplitter;
use crate::algorithm::summary::EffectTable;
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::io::{self, PanelFile};
use crate::models::cell::PanelRow;
use crate::models::estimate::{EffectRow, PeriodOutcome};
use crate::reader::MicrodataReader;

/// Label used for the pooled interaction model when it cannot be fitted
pub const POOLED_LABEL: &str = "pooled";

/// Output of the panel stage
#[derive(Debug, Clone, PartialEq)]
pub struct PanelBuild {
    /// Rows in cell-key order
    pub rows: Vec<PanelRow>,
    pub empty_cells: usize,
    pub counts: RecordCounts,
}

/// Output of the estimation stage
#[derive(Debug, Clone, PartialEq)]
pub struct Estimates {
    pub effects: EffectTable,
    /// Parent × period terms of the pooled model, or a single failed row
    pub interactions: Vec<PeriodOutcome>,
}

impl Estimates {
    #[must_use]
    pub fn interaction_rows(&self) -> Vec<EffectRow> {
        self.interactions.iter().map(EffectRow::from).collect()
    }
}

/// Where `run` writes its artifacts
#[derive(Debug, Clone)]
pub struct RunOutputs {
    pub panel: PathBuf,
    pub effects: PathBuf,
    pub interactions: Option<PathBuf>,
    pub summary: Option<PathBuf>,
}

/// Per-period line of the run summary
#[derive(Debug, Clone, Serialize)]
pub struct PeriodSummary {
    pub label: String,
    pub panel_rows: usize,
    pub estimated: bool,
    pub message: Option<String>,
}

/// Machine-readable account of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub elapsed_seconds: f64,
    pub records: RecordCounts,
    pub empty_cells: usize,
    pub panel_rows: usize,
    pub periods: Vec<PeriodSummary>,
    pub failed_periods: Vec<String>,
    pub config: AnalysisConfig,
}

impl RunSummary {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_periods.is_empty()
    }
}

/// Resolve aggregated cells into panel rows
pub fn panel_from_aggregation(output: AggregationOutput, config: &AnalysisConfig) -> Result<PanelBuild> {
    let splitter = PeriodSplitter::new(&config.period_boundaries)?;
    let rows = output.to_panel(&splitter)?;
    Ok(PanelBuild {
        rows,
        empty_cells: output.empty_cells,
        counts: output.counts,
    })
}

/// Stream `input` into a panel
pub fn build_panel(input: &Path, config: &AnalysisConfig) -> Result<PanelBuild> {
    config.validate()?;
    let reader = MicrodataReader::open(input, config.batch_size)?;
    info!(
        "Microdata has {} rows in {} row groups",
        reader.row_count(),
        reader.row_group_count()
    );
    let build = panel_from_aggregation(reader.aggregate(config)?, config)?;
    info!("Panel has {} rows", build.rows.len());
    Ok(build)
}

/// Per-period effects plus the pooled interaction model, fitted on a pool
/// of `config.worker_threads()`
pub fn estimate(panel: &[PanelRow], config: &AnalysisConfig) -> Result<Estimates> {
    let pool = config.thread_pool()?;
    Ok(pool.install(|| estimate_on_current_pool(panel, config)))
}

fn estimate_on_current_pool(panel: &[PanelRow], config: &AnalysisConfig) -> Estimates {
    let labels: Vec<String> = config
        .period_boundaries
        .iter()
        .map(|w| w.label.clone())
        .collect();
    let estimator = DidEstimator::new(config, panel);
    let effects = EffectTable::collect(&labels, estimator.estimate_all(&labels, panel));

    let interactions = if labels.len() < 2 {
        Vec::new()
    } else {
        match estimator.estimate_pooled(&labels, panel) {
            Ok(terms) => terms.into_iter().map(PeriodOutcome::Estimated).collect(),
            Err(err) => {
                warn!("Pooled interaction model could not be estimated: {err}");
                vec![PeriodOutcome::Failed {
                    label: POOLED_LABEL.to_string(),
                    message: err.to_string(),
                }]
            }
        }
    };

    Estimates {
        effects,
        interactions,
    }
}

/// Warn when a panel file was built with settings other than `config`'s
pub fn check_panel_settings(panel: &PanelFile, config: &AnalysisConfig) {
    let expected_definition = config.parent_definition.to_string();
    if let Some(found) = panel.parent_definition().filter(|f| *f != expected_definition) {
        warn!("Panel was built with parent definition {found}, configuration says {expected_definition}");
    }
    let expected_stratifier = config.stratify_by.to_string();
    if let Some(found) = panel.stratify_by().filter(|f| *f != expected_stratifier) {
        warn!("Panel was built with stratify_by {found}, configuration says {expected_stratifier}");
    }
}

/// Build the panel, estimate effects and write every artifact
pub fn run(input: &Path, outputs: &RunOutputs, config: &AnalysisConfig) -> Result<RunSummary> {
    let started_at = chrono::Utc::now().to_rfc3339();
    let start = Instant::now();
    info!("Starting run\n{config}");

    let build = build_panel(input, config)?;
    io::write_panel(&outputs.panel, &build.rows, config)?;

    let estimates = estimate(&build.rows, config)?;
    io::write_effects(&outputs.effects, &estimates.effects.to_effect_rows())?;
    if let Some(path) = &outputs.interactions {
        io::write_effects(path, &estimates.interaction_rows())?;
    }

    let summary = summarize(&build, &estimates, config, started_at, start.elapsed().as_secs_f64());
    if let Some(path) = &outputs.summary {
        io::write_json(path, &summary)?;
    }

    if summary.is_complete() {
        info!("Run finished in {:.1}s", summary.elapsed_seconds);
    } else {
        warn!(
            "Run finished in {:.1}s with failed periods: {}",
            summary.elapsed_seconds,
            summary.failed_periods.join(", ")
        );
    }
    Ok(summary)
}

/// Assemble the run summary
#[must_use]
pub fn summarize(
    build: &PanelBuild,
    estimates: &Estimates,
    config: &AnalysisConfig,
    started_at: String,
    elapsed_seconds: f64,
) -> RunSummary {
    let periods = estimates
        .effects
        .rows()
        .iter()
        .map(|outcome| PeriodSummary {
            label: outcome.label().to_string(),
            panel_rows: build
                .rows
                .iter()
                .filter(|r| r.period_label == outcome.label())
                .count(),
            estimated: !outcome.is_failed(),
            message: match outcome {
                PeriodOutcome::Failed { message, .. } => Some(message.clone()),
                PeriodOutcome::Estimated(_) => None,
            },
        })
        .collect();

    RunSummary {
        started_at,
        elapsed_seconds,
        records: build.counts.clone(),
        empty_cells: build.empty_cells,
        panel_rows: build.rows.len(),
        periods,
        failed_periods: estimates.effects.failed_periods(),
        config: config.clone(),
    }
}
