//! Reading and writing pipeline artifacts
//!
//! Tables are converted to Arrow with `serde_arrow` from their row structs
//! and written as Parquet or CSV depending on the file extension.

pub mod tables;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::error::util::{safe_create_file, safe_open_file};
use crate::error::{AbsenceError, Result};
use crate::models::cell::PanelRow;
use crate::models::estimate::EffectRow;
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Metadata key for the parent definition a panel was built with
pub const PARENT_DEFINITION_KEY: &str = "parent_definition";
/// Metadata key for the stratifier a panel was built with
pub const STRATIFY_BY_KEY: &str = "stratify_by";

/// Table file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Parquet,
    Csv,
}

impl OutputFormat {
    /// Format implied by the file extension (`.parquet`, `.pq` or `.csv`)
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("parquet" | "pq") => Ok(Self::Parquet),
            Some("csv") => Ok(Self::Csv),
            _ => Err(AbsenceError::InvalidConfig(format!(
                "cannot infer a table format from {} (use .parquet or .csv)",
                path.display()
            ))),
        }
    }
}

/// A panel read back from disk
#[derive(Debug, Clone, PartialEq)]
pub struct PanelFile {
    pub rows: Vec<PanelRow>,
    /// Build settings stored with the panel (Parquet only)
    pub metadata: BTreeMap<String, String>,
}

impl PanelFile {
    #[must_use]
    pub fn parent_definition(&self) -> Option<&str> {
        self.metadata.get(PARENT_DEFINITION_KEY).map(String::as_str)
    }

    #[must_use]
    pub fn stratify_by(&self) -> Option<&str> {
        self.metadata.get(STRATIFY_BY_KEY).map(String::as_str)
    }
}

/// Panel rows as one Arrow batch
pub fn panel_batch(rows: &[PanelRow]) -> Result<RecordBatch> {
    Ok(serde_arrow::to_record_batch(&PanelRow::fields(), &rows)?)
}

/// Effect rows as one Arrow batch
pub fn effects_batch(rows: &[EffectRow]) -> Result<RecordBatch> {
    Ok(serde_arrow::to_record_batch(&EffectRow::fields(), &rows)?)
}

/// Settings recorded alongside a panel
#[must_use]
pub fn panel_metadata(config: &AnalysisConfig) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            PARENT_DEFINITION_KEY.to_string(),
            config.parent_definition.to_string(),
        ),
        (STRATIFY_BY_KEY.to_string(), config.stratify_by.to_string()),
    ])
}

/// Encode a panel as Parquet into `sink`
pub fn write_panel_to<W: Write + Send>(sink: W, rows: &[PanelRow], config: &AnalysisConfig) -> Result<()> {
    tables::write_parquet(sink, &panel_batch(rows)?, &panel_metadata(config))
}

/// Write the panel to `path` in the format its extension names
pub fn write_panel(path: &Path, rows: &[PanelRow], config: &AnalysisConfig) -> Result<()> {
    let start = Instant::now();
    log_operation_start("Writing panel to", path);
    let batch = panel_batch(rows)?;
    write_table(path, &batch, &panel_metadata(config), "panel output")?;
    log_operation_complete("wrote", path, rows.len(), Some(start.elapsed()));
    Ok(())
}

/// Write an effects or interactions table
pub fn write_effects(path: &Path, rows: &[EffectRow]) -> Result<()> {
    log_operation_start("Writing estimates to", path);
    let batch = effects_batch(rows)?;
    write_table(path, &batch, &BTreeMap::new(), "estimate output")?;
    log_operation_complete("wrote", path, rows.len(), None);
    Ok(())
}

fn write_table(
    path: &Path,
    batch: &RecordBatch,
    metadata: &BTreeMap<String, String>,
    purpose: &str,
) -> Result<()> {
    let format = OutputFormat::from_path(path)?;
    let file = safe_create_file(path, purpose)?;
    match format {
        OutputFormat::Parquet => tables::write_parquet(file, batch, metadata),
        OutputFormat::Csv => tables::write_csv(file, batch),
    }
}

/// Read a panel written by [`write_panel`]
pub fn read_panel(path: &Path) -> Result<PanelFile> {
    let start = Instant::now();
    log_operation_start("Reading panel from", path);
    let schema = PanelRow::schema();
    let file = safe_open_file(path, "panel input")?;
    let (batches, metadata) = match OutputFormat::from_path(path)? {
        OutputFormat::Parquet => tables::read_parquet(file, &schema)?,
        OutputFormat::Csv => (tables::read_csv(file, &schema)?, BTreeMap::new()),
    };

    let mut rows = Vec::new();
    for batch in &batches {
        let decoded: Vec<PanelRow> = serde_arrow::from_record_batch(batch)?;
        rows.extend(decoded);
    }
    log_operation_complete("read", path, rows.len(), Some(start.elapsed()));
    Ok(PanelFile { rows, metadata })
}

/// Write a value as pretty-printed JSON
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = safe_create_file(path, "JSON output")?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
