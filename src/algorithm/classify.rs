//! Record classification
//!
//! Validates the coded fields of a `RawRecord` against the CPS codebook and
//! derives eligibility, parent status and own-illness absence. The parent
//! definition is fixed when the classifier is built, so the per-record path
//! is a plain match on a copied enum value.

use crate::config::{AnalysisConfig, ParentDefinition};
use crate::error::{AbsenceError, Result};
use crate::models::period::YearMonth;
use crate::models::record::{ClassifiedRecord, RawRecord, columns};
use crate::models::types::{EducationGroup, Sex};

/// `EMPSTAT`: at work
pub const EMPSTAT_AT_WORK: i64 = 10;
/// `EMPSTAT`: has job, not at work last week
pub const EMPSTAT_HAS_JOB_NOT_AT_WORK: i64 = 12;
/// `UHRSWORKT`: not in universe / missing
pub const USUAL_HOURS_MISSING: i64 = 999;
/// `CLASSWKR`: armed forces
pub const CLASSWKR_ARMED_FORCES: i64 = 26;
/// `ABSENT`: has job, absent for a reason other than layoff
pub const ABSENT_WITH_JOB: i64 = 3;

const EMPSTAT_CODES: [i64; 14] = [0, 1, 10, 12, 20, 21, 22, 30, 31, 32, 33, 34, 35, 36];

/// Classifies raw records under one run configuration
#[derive(Debug, Clone)]
pub struct RecordClassifier {
    definition: ParentDefinition,
    min_age: u16,
    max_age: u16,
    illness_codes: Vec<i64>,
}

impl RecordClassifier {
    #[must_use]
    pub fn new(config: &AnalysisConfig) -> Self {
        let mut illness_codes = config.illness_reason_codes.clone();
        illness_codes.sort_unstable();
        illness_codes.dedup();
        Self {
            definition: config.parent_definition,
            min_age: config.eligible_age_range.0,
            max_age: config.eligible_age_range.1,
            illness_codes,
        }
    }

    /// The parent definition applied by this classifier
    #[must_use]
    pub const fn parent_definition(&self) -> ParentDefinition {
        self.definition
    }

    /// Validate and classify one record
    pub fn classify(&self, raw: &RawRecord) -> Result<ClassifiedRecord> {
        let row = raw.row;
        if let Some((field, value)) = raw.malformed {
            return Err(AbsenceError::invalid_record(
                row,
                field,
                format!("value {value} is not a whole-number code"),
            ));
        }

        let year = required_in(row, columns::YEAR, raw.year, 1962..=2100)?;
        let month = required_in(row, columns::MONTH, raw.month, 1..=12)?;
        let state = required_in(row, columns::STATE, raw.state, 1..=56)?;
        let age = required_in(row, columns::AGE, raw.age, 0..=99)?;
        let sex = required(row, columns::SEX, raw.sex)?;
        if !matches!(sex, 1 | 2 | 9) {
            return Err(out_of_range(row, columns::SEX, sex));
        }
        let education = required_in(row, columns::EDUCATION, raw.education, 0..=999)?;
        let empstat = required(row, columns::EMPLOYMENT_STATUS, raw.employment_status)?;
        if !EMPSTAT_CODES.contains(&empstat) {
            return Err(out_of_range(row, columns::EMPLOYMENT_STATUS, empstat));
        }
        let usual_hours = match raw.usual_hours {
            Some(code) if !(0..=USUAL_HOURS_MISSING).contains(&code) => {
                return Err(out_of_range(row, columns::USUAL_HOURS, code));
            }
            other => other,
        };
        let class_of_worker =
            required_in(row, columns::CLASS_OF_WORKER, raw.class_of_worker, 0..=99)?;
        let absent = required_in(row, columns::ABSENT, raw.absent, 0..=3)?;
        let child_count = required_in(row, columns::CHILD_COUNT, raw.child_count, 0..=9)?;
        let child_under5 =
            required_in(row, columns::CHILD_UNDER5_COUNT, raw.child_under5_count, 0..=9)?;
        let mother_link = required_in(row, columns::MOTHER_LINK, raw.mother_link, 0..=99)?;
        let father_link = required_in(row, columns::FATHER_LINK, raw.father_link, 0..=99)?;
        let weight = raw
            .weight
            .ok_or_else(|| AbsenceError::invalid_record(row, columns::WEIGHT, "missing value"))?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(AbsenceError::invalid_record(
                row,
                columns::WEIGHT,
                format!("weight {weight} is not a finite non-negative number"),
            ));
        }

        let employed = empstat == EMPSTAT_AT_WORK || empstat == EMPSTAT_HAS_JOB_NOT_AT_WORK;
        let has_hours = usual_hours.is_some_and(|code| code != USUAL_HOURS_MISSING);
        let civilian = class_of_worker != CLASSWKR_ARMED_FORCES;
        let in_age_range = (i64::from(self.min_age)..=i64::from(self.max_age)).contains(&age);
        let is_eligible = employed && has_hours && civilian && in_age_range;

        // Unlisted and missing reasons are non-illness, never invalid
        let illness_reason = raw
            .absence_reason
            .is_some_and(|code| self.illness_codes.binary_search(&code).is_ok());
        let is_absent_illness = is_eligible && absent == ABSENT_WITH_JOB && illness_reason;

        let is_parent = match self.definition {
            ParentDefinition::AnyChild => child_count > 0,
            ParentDefinition::CoresidentLink => {
                (mother_link > 0 || father_link > 0) && child_count > 0
            }
            ParentDefinition::ChildUnder5 => child_under5 > 0,
        };

        Ok(ClassifiedRecord {
            row,
            period: YearMonth {
                year: year as i32,
                month: month as u32,
            },
            state: state as u16,
            age: age as u16,
            sex: Sex::from(sex),
            education: EducationGroup::from(education),
            weight,
            is_eligible,
            is_parent,
            parent_definition: self.definition,
            is_absent_illness,
        })
    }
}

fn required(row: u64, field: &'static str, value: Option<i64>) -> Result<i64> {
    value.ok_or_else(|| AbsenceError::invalid_record(row, field, "missing value"))
}

fn required_in(
    row: u64,
    field: &'static str,
    value: Option<i64>,
    range: std::ops::RangeInclusive<i64>,
) -> Result<i64> {
    let value = required(row, field, value)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(out_of_range(row, field, value))
    }
}

fn out_of_range(row: u64, field: &'static str, value: i64) -> AbsenceError {
    AbsenceError::invalid_record(row, field, format!("code {value} is not documented"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An eligible, non-absent 35 year old with one child
    fn worker(row: u64) -> RawRecord {
        RawRecord {
            row,
            year: Some(1994),
            month: Some(1),
            state: Some(6),
            age: Some(35),
            sex: Some(2),
            education: Some(111),
            employment_status: Some(10),
            usual_hours: Some(40),
            class_of_worker: Some(21),
            absent: Some(1),
            absence_reason: None,
            child_count: Some(1),
            child_under5_count: Some(0),
            mother_link: Some(0),
            father_link: Some(0),
            weight: Some(1.0),
            malformed: None,
        }
    }

    fn classifier_with(definition: ParentDefinition) -> RecordClassifier {
        RecordClassifier::new(&AnalysisConfig {
            parent_definition: definition,
            ..Default::default()
        })
    }

    #[test]
    fn test_eligible_worker() {
        let record = classifier_with(ParentDefinition::AnyChild)
            .classify(&worker(0))
            .unwrap();
        assert!(record.is_eligible);
        assert!(record.is_parent);
        assert!(!record.is_absent_illness);
        assert_eq!(record.sex, Sex::Female);
        assert_eq!(record.education, EducationGroup::College);
        assert_eq!(record.parent_definition, ParentDefinition::AnyChild);
    }

    #[test]
    fn test_eligibility_conditions() {
        let classifier = classifier_with(ParentDefinition::AnyChild);

        let unemployed = RawRecord {
            employment_status: Some(21),
            ..worker(1)
        };
        assert!(!classifier.classify(&unemployed).unwrap().is_eligible);

        let no_hours = RawRecord {
            usual_hours: Some(USUAL_HOURS_MISSING),
            ..worker(2)
        };
        assert!(!classifier.classify(&no_hours).unwrap().is_eligible);

        let null_hours = RawRecord {
            usual_hours: None,
            ..worker(3)
        };
        assert!(!classifier.classify(&null_hours).unwrap().is_eligible);

        let too_old = RawRecord {
            age: Some(50),
            ..worker(4)
        };
        assert!(!classifier.classify(&too_old).unwrap().is_eligible);

        let soldier = RawRecord {
            class_of_worker: Some(CLASSWKR_ARMED_FORCES),
            ..worker(5)
        };
        assert!(!classifier.classify(&soldier).unwrap().is_eligible);

        let absent_with_job = RawRecord {
            employment_status: Some(EMPSTAT_HAS_JOB_NOT_AT_WORK),
            ..worker(6)
        };
        assert!(classifier.classify(&absent_with_job).unwrap().is_eligible);
    }

    #[test]
    fn test_own_illness_absence() {
        let classifier = classifier_with(ParentDefinition::AnyChild);
        let ill = RawRecord {
            employment_status: Some(12),
            absent: Some(ABSENT_WITH_JOB),
            absence_reason: Some(8),
            ..worker(0)
        };
        assert!(classifier.classify(&ill).unwrap().is_absent_illness);

        let vacation = RawRecord {
            absence_reason: Some(7),
            ..ill.clone()
        };
        assert!(!classifier.classify(&vacation).unwrap().is_absent_illness);

        let missing_reason = RawRecord {
            absence_reason: None,
            ..ill.clone()
        };
        assert!(!classifier.classify(&missing_reason).unwrap().is_absent_illness);
    }

    #[test]
    fn test_unlisted_reason_is_non_illness_not_invalid() {
        let classifier = classifier_with(ParentDefinition::AnyChild);
        let record = RawRecord {
            employment_status: Some(12),
            absent: Some(ABSENT_WITH_JOB),
            absence_reason: Some(73),
            ..worker(9)
        };
        let classified = classifier.classify(&record).unwrap();
        assert!(classified.is_eligible);
        assert!(!classified.is_absent_illness);
    }

    #[test]
    fn test_absence_requires_eligibility() {
        let classifier = classifier_with(ParentDefinition::AnyChild);
        let ill_but_old = RawRecord {
            age: Some(60),
            employment_status: Some(12),
            absent: Some(ABSENT_WITH_JOB),
            absence_reason: Some(8),
            ..worker(0)
        };
        let classified = classifier.classify(&ill_but_old).unwrap();
        assert!(!classified.is_eligible);
        assert!(!classified.is_absent_illness);
    }

    #[test]
    fn test_parent_definitions() {
        let linked_no_child = RawRecord {
            child_count: Some(0),
            mother_link: Some(2),
            ..worker(0)
        };
        let linked_with_child = RawRecord {
            mother_link: Some(2),
            ..worker(1)
        };
        let toddler = RawRecord {
            child_count: Some(2),
            child_under5_count: Some(1),
            ..worker(2)
        };

        let any = classifier_with(ParentDefinition::AnyChild);
        assert!(!any.classify(&linked_no_child).unwrap().is_parent);
        assert!(any.classify(&worker(3)).unwrap().is_parent);

        let link = classifier_with(ParentDefinition::CoresidentLink);
        assert!(!link.classify(&linked_no_child).unwrap().is_parent);
        assert!(link.classify(&linked_with_child).unwrap().is_parent);
        assert!(!link.classify(&worker(3)).unwrap().is_parent);

        let under5 = classifier_with(ParentDefinition::ChildUnder5);
        assert!(under5.classify(&toddler).unwrap().is_parent);
        assert!(!under5.classify(&worker(3)).unwrap().is_parent);
        assert_eq!(
            under5.classify(&toddler).unwrap().parent_definition,
            ParentDefinition::ChildUnder5
        );
    }

    #[test]
    fn test_invalid_records_name_row_and_field() {
        let classifier = classifier_with(ParentDefinition::AnyChild);

        let missing_state = RawRecord {
            state: None,
            ..worker(41)
        };
        match classifier.classify(&missing_state) {
            Err(AbsenceError::InvalidRecord { row, field, .. }) => {
                assert_eq!(row, 41);
                assert_eq!(field, columns::STATE);
            }
            other => panic!("expected InvalidRecord, got {other:?}"),
        }

        let bad_empstat = RawRecord {
            employment_status: Some(11),
            ..worker(42)
        };
        assert!(matches!(
            classifier.classify(&bad_empstat),
            Err(AbsenceError::InvalidRecord { field: "EMPSTAT", .. })
        ));

        let negative_weight = RawRecord {
            weight: Some(-3.0),
            ..worker(43)
        };
        assert!(matches!(
            classifier.classify(&negative_weight),
            Err(AbsenceError::InvalidRecord { field: "WTFINL", .. })
        ));

        let fractional = RawRecord {
            employment_status: None,
            malformed: Some((columns::EMPLOYMENT_STATUS, 10.7)),
            ..worker(45)
        };
        assert!(matches!(
            classifier.classify(&fractional),
            Err(AbsenceError::InvalidRecord { row: 45, field: "EMPSTAT", .. })
        ));

        let bad_month = RawRecord {
            month: Some(13),
            ..worker(44)
        };
        assert!(matches!(
            classifier.classify(&bad_month),
            Err(AbsenceError::InvalidRecord { field: "MONTH", .. })
        ));
    }
}
