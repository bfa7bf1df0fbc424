//! Analysis stages
//!
//! Classification and aggregation turn microdata into the cohort panel;
//! design, WLS and DiD turn the panel into per-period parent effects.

pub mod aggregate;
pub mod classify;
pub mod design;
pub mod did;
pub mod periods;
pub mod summary;
pub mod wls;

pub use aggregate::{AggregationOutput, PanelAggregator, RecordCounts, aggregate};
pub use classify::RecordClassifier;
pub use design::{DesignMatrix, FixedEffectLayout, Regressor};
pub use did::DidEstimator;
pub use periods::PeriodSplitter;
pub use summary::EffectTable;
pub use wls::{WlsFit, fit_wls};
