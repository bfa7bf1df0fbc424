//! Monthly panel of own-illness work-absence rates from CPS microdata, with
//! per-period parent vs non-parent difference-in-differences estimates.
//!
//! The pipeline runs in two stages. [`pipeline::build_panel`] streams the
//! person-month extract through [`RecordClassifier`] into a
//! [`PanelAggregator`], producing one weighted rate per cohort cell.
//! [`pipeline::estimate`] fits a weighted regression per period with state
//! and month fixed effects and collects the parent coefficients into an
//! [`EffectTable`].

pub mod algorithm;
pub mod config;
pub mod error;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod reader;
pub mod utils;

pub use algorithm::{
    DidEstimator, EffectTable, FixedEffectLayout, PanelAggregator, PeriodSplitter,
    RecordClassifier,
};
pub use config::{AnalysisConfig, ClusterBy, ParentDefinition, StratifyBy};
pub use error::{AbsenceError, Result};
pub use models::{
    ClassifiedRecord, CohortCell, EffectEstimate, EffectRow, PanelRow, PeriodOutcome,
    PeriodWindow, RawRecord, YearMonth,
};
pub use pipeline::{RunOutputs, RunSummary};
pub use reader::MicrodataReader;
