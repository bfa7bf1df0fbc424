//! Person-month survey records
//!
//! `RawRecord` mirrors one row of the CPS extract with every coded field left
//! optional so that missing values reach the classifier. `ClassifiedRecord`
//! holds the validated fields plus the derived flags.

use crate::config::ParentDefinition;
use crate::models::period::YearMonth;
use crate::models::types::{EducationGroup, Sex};

/// Source column names in the IPUMS CPS extract
pub mod columns {
    pub const YEAR: &str = "YEAR";
    pub const MONTH: &str = "MONTH";
    pub const STATE: &str = "STATEFIP";
    pub const AGE: &str = "AGE";
    pub const SEX: &str = "SEX";
    pub const EDUCATION: &str = "EDUC";
    pub const EMPLOYMENT_STATUS: &str = "EMPSTAT";
    pub const USUAL_HOURS: &str = "UHRSWORKT";
    pub const CLASS_OF_WORKER: &str = "CLASSWKR";
    pub const ABSENT: &str = "ABSENT";
    pub const ABSENCE_REASON: &str = "WHYABSNT";
    pub const CHILD_COUNT: &str = "NCHILD";
    pub const CHILD_UNDER5_COUNT: &str = "NCHLT5";
    pub const MOTHER_LINK: &str = "MOMLOC";
    pub const FATHER_LINK: &str = "POPLOC";
    pub const WEIGHT: &str = "WTFINL";

    /// Integer-coded columns, in reading order
    pub const CODED: [&str; 15] = [
        YEAR,
        MONTH,
        STATE,
        AGE,
        SEX,
        EDUCATION,
        EMPLOYMENT_STATUS,
        USUAL_HOURS,
        CLASS_OF_WORKER,
        ABSENT,
        ABSENCE_REASON,
        CHILD_COUNT,
        CHILD_UNDER5_COUNT,
        MOTHER_LINK,
        FATHER_LINK,
    ];
}

/// One person-month observation as read from the extract
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// Zero-based row index in the source
    pub row: u64,
    pub year: Option<i64>,
    pub month: Option<i64>,
    pub state: Option<i64>,
    pub age: Option<i64>,
    pub sex: Option<i64>,
    pub education: Option<i64>,
    pub employment_status: Option<i64>,
    pub usual_hours: Option<i64>,
    pub class_of_worker: Option<i64>,
    pub absent: Option<i64>,
    pub absence_reason: Option<i64>,
    pub child_count: Option<i64>,
    pub child_under5_count: Option<i64>,
    pub mother_link: Option<i64>,
    pub father_link: Option<i64>,
    pub weight: Option<f64>,
    /// First coded column holding a value that is not a whole number
    pub malformed: Option<(&'static str, f64)>,
}

/// A validated record with its derived classification
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRecord {
    pub row: u64,
    pub period: YearMonth,
    pub state: u16,
    pub age: u16,
    pub sex: Sex,
    pub education: EducationGroup,
    pub weight: f64,
    /// Employed civilian in the age range with a usual-hours code
    pub is_eligible: bool,
    /// Parent under `parent_definition`
    pub is_parent: bool,
    /// Definition that produced `is_parent`
    pub parent_definition: ParentDefinition,
    /// Absent from a job for own illness; never true unless `is_eligible`
    pub is_absent_illness: bool,
}
