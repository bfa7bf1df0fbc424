use absence_panel::{AbsenceError, AnalysisConfig, ParentDefinition, RecordClassifier};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::utils::{as_ill, as_parent, worker};

#[test]
fn test_absence_with_unlisted_reason_is_not_illness() {
    let classifier = RecordClassifier::new(&AnalysisConfig::default());
    // Absent with a job, reason code 5 (vacation)
    let vacation = absence_panel::RawRecord {
        employment_status: Some(12),
        absent: Some(3),
        absence_reason: Some(5),
        ..worker(0)
    };
    let record = classifier.classify(&vacation).unwrap();
    assert!(record.is_eligible);
    assert!(!record.is_absent_illness);
}

#[test]
fn test_configured_reason_codes_are_honoured() {
    let config = AnalysisConfig {
        illness_reason_codes: vec![5, 8],
        ..AnalysisConfig::default()
    };
    let classifier = RecordClassifier::new(&config);
    let vacation = absence_panel::RawRecord {
        absence_reason: Some(5),
        ..as_ill(worker(0))
    };
    assert!(classifier.classify(&vacation).unwrap().is_absent_illness);
}

#[test]
fn test_illness_implies_eligibility_on_random_records() {
    let mut rng = StdRng::seed_from_u64(7);
    let definitions = [
        ParentDefinition::AnyChild,
        ParentDefinition::CoresidentLink,
        ParentDefinition::ChildUnder5,
    ];
    for definition in definitions {
        let classifier = RecordClassifier::new(&AnalysisConfig {
            parent_definition: definition,
            ..AnalysisConfig::default()
        });
        for row in 0..2_000u64 {
            let raw = absence_panel::RawRecord {
                age: Some(rng.random_range(15..=70)),
                employment_status: Some([10, 12, 21, 22, 32][rng.random_range(0..5)]),
                usual_hours: Some(if rng.random_bool(0.1) { 999 } else { rng.random_range(1..=80) }),
                class_of_worker: Some(if rng.random_bool(0.05) { 26 } else { 21 }),
                absent: Some(rng.random_range(0..=3)),
                absence_reason: Some(rng.random_range(0..=11)),
                child_count: Some(rng.random_range(0..=3)),
                child_under5_count: Some(rng.random_range(0..=1)),
                mother_link: Some(rng.random_range(0..=2)),
                ..worker(row)
            };
            let record = classifier.classify(&raw).unwrap();
            assert!(
                !record.is_absent_illness || record.is_eligible,
                "row {row} is ill but ineligible"
            );
            assert_eq!(record.parent_definition, definition);
        }
    }
}

#[test]
fn test_parent_definitions_disagree_where_expected() {
    let raw = as_parent(worker(0));
    let parent_under = |definition| {
        RecordClassifier::new(&AnalysisConfig {
            parent_definition: definition,
            ..AnalysisConfig::default()
        })
        .classify(&raw)
        .unwrap()
        .is_parent
    };
    // One own child, none under five, no parent pointer
    assert!(parent_under(ParentDefinition::AnyChild));
    assert!(!parent_under(ParentDefinition::ChildUnder5));
    assert!(!parent_under(ParentDefinition::CoresidentLink));
}

#[test]
fn test_invalid_record_names_row_and_field() {
    let classifier = RecordClassifier::new(&AnalysisConfig::default());
    let raw = absence_panel::RawRecord {
        month: Some(13),
        ..worker(41)
    };
    match classifier.classify(&raw) {
        Err(AbsenceError::InvalidRecord { row, field, .. }) => {
            assert_eq!(row, 41);
            assert_eq!(field, "MONTH");
        }
        other => panic!("expected InvalidRecord, got {other:?}"),
    }
}
