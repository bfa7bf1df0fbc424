//! Domain models for the absence panel
//!
//! Records flow leaf-first through these types: `RawRecord` →
//! `ClassifiedRecord` → `CohortCell` → `PanelRow` → `EffectEstimate`.

pub mod cell;
pub mod estimate;
pub mod period;
pub mod record;
pub mod types;

pub use cell::{CellKey, CellTotals, CohortCell, PanelRow, Stratum};
pub use estimate::{EffectEstimate, EffectRow, PeriodOutcome};
pub use period::{PeriodWindow, YearMonth};
pub use record::{ClassifiedRecord, RawRecord};
pub use types::{EducationGroup, Sex};
