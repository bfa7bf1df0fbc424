//! Error handling for the absence panel pipeline.
//!
//! Errors fall into three scopes. Record-level errors (`InvalidRecord`) are
//! counted and skipped, run-level errors (`UnboundedDate`, `Schema`,
//! `InvalidConfig`) abort the run, and period-level errors
//! (`InsufficientData`) only abort the estimate for that period.

use std::io;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

pub mod util;

/// Specialized error type for the absence panel pipeline
#[derive(Debug, thiserror::Error)]
pub enum AbsenceError {
    /// A source row is missing a required field or holds an out-of-range code
    #[error("Invalid record at row {row}: field {field}: {reason}")]
    InvalidRecord {
        row: u64,
        field: &'static str,
        reason: String,
    },

    /// A (year, month) falls outside every configured analysis window
    #[error("Date {year}-{month:02} is outside every configured period")]
    UnboundedDate { year: i32, month: u32 },

    /// The regression design for a period cannot be identified
    #[error("Insufficient data for period {period}: {reason}")]
    InsufficientData { period: String, reason: String },

    /// One or more periods have no estimate in the effect table
    #[error("Missing estimates for periods: {}", periods.join(", "))]
    IncompleteEstimates { periods: Vec<String> },

    /// The configuration is internally inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The input does not have the expected columns
    #[error("Schema error: {0}")]
    Schema(String),

    /// Error opening or reading a file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error processing Arrow data
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error reading or writing JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error converting between Rust rows and Arrow batches
    #[error("Serde arrow error: {0}")]
    SerdeArrow(#[from] serde_arrow::Error),
}

impl AbsenceError {
    /// Build an `InvalidRecord` error
    pub fn invalid_record(row: u64, field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            row,
            field,
            reason: reason.into(),
        }
    }

    /// Build an `InsufficientData` error
    pub fn insufficient_data(period: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            period: period.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for absence panel operations
pub type Result<T> = std::result::Result<T, AbsenceError>;
