use absence_panel::algorithm::aggregate::aggregate;
use absence_panel::pipeline::{self, panel_from_aggregation};
use absence_panel::{
    AbsenceError, AnalysisConfig, ClassifiedRecord, ClusterBy, ParentDefinition, StratifyBy,
    YearMonth,
};
use absence_panel::models::types::{EducationGroup, Sex};

/// Records for one year with `ill_parents` / `ill_others` of 40 ill per cell
fn year_of_records(year: i32, states: &[u16], ill_parents: usize, ill_others: usize) -> Vec<ClassifiedRecord> {
    let mut records = Vec::new();
    for &state in states {
        for month in 1..=12u32 {
            for (is_parent, ill) in [(true, ill_parents), (false, ill_others)] {
                // Vary the count a little by state and month so residuals are not zero
                let ill = ill + (usize::from(state) + month as usize) % 3;
                // Composition varies non-additively across cells so the shares are identified
                let women = 10 + (usize::from(state) * month as usize) % 17;
                let graduates = 5 + (usize::from(state) + (month * month) as usize) % 11;
                for i in 0..40 {
                    records.push(ClassifiedRecord {
                        row: records.len() as u64,
                        period: YearMonth { year, month },
                        state,
                        age: 30,
                        sex: if i < women { Sex::Female } else { Sex::Male },
                        education: if i >= 40 - graduates {
                            EducationGroup::College
                        } else {
                            EducationGroup::HighSchool
                        },
                        weight: 1.0 + (i % 4) as f64,
                        is_eligible: true,
                        is_parent,
                        parent_definition: ParentDefinition::AnyChild,
                        is_absent_illness: i < ill,
                    });
                }
            }
        }
    }
    records
}

#[test]
fn test_single_state_period_fails_while_others_estimate() {
    let mut records = year_of_records(2001, &[1, 6, 36], 4, 2);
    records.extend(year_of_records(2012, &[17], 4, 2));
    records.extend(year_of_records(2022, &[1, 6, 36], 6, 2));

    let config = AnalysisConfig::default();
    let build = panel_from_aggregation(aggregate(&records, StratifyBy::Pooled), &config).unwrap();
    let estimates = pipeline::estimate(&build.rows, &config).unwrap();

    let table = &estimates.effects;
    assert_eq!(table.rows().len(), 3);
    assert!(table.get("P1").is_some());
    assert!(table.get("P2").is_none());
    assert!(table.get("P3").is_some());
    assert_eq!(table.failed_periods(), vec!["P2".to_string()]);
    match table.ensure_complete() {
        Err(AbsenceError::IncompleteEstimates { periods }) => assert_eq!(periods, vec!["P2"]),
        other => panic!("expected IncompleteEstimates, got {other:?}"),
    }

    let rows = table.to_effect_rows();
    assert_eq!(rows[1].status, "failed");
    assert!(rows[1].message.as_deref().unwrap().contains("at least 2 states"));
    assert_eq!(rows[0].se_policy.as_deref(), Some("cluster_state"));
}

#[test]
fn test_effect_grows_with_parent_illness() {
    let mut records = year_of_records(2003, &[1, 6, 36, 48], 4, 2);
    records.extend(year_of_records(2015, &[1, 6, 36, 48], 4, 2));
    records.extend(year_of_records(2021, &[1, 6, 36, 48], 8, 2));

    let config = AnalysisConfig {
        include_covariates: false,
        ..AnalysisConfig::default()
    };
    let build = panel_from_aggregation(aggregate(&records, StratifyBy::Pooled), &config).unwrap();
    let estimates = pipeline::estimate(&build.rows, &config).unwrap();
    estimates.effects.ensure_complete().unwrap();

    let p1 = estimates.effects.get("P1").unwrap();
    let p3 = estimates.effects.get("P3").unwrap();
    // Two extra ill of 40 per cell, then six extra
    assert!((p1.coefficient - 0.05).abs() < 0.01, "{p1:?}");
    assert!((p3.coefficient - 0.15).abs() < 0.01, "{p3:?}");
    assert_eq!(p1.clusters, 4);

    let interactions = estimates.interaction_rows();
    assert_eq!(interactions.len(), 2);
    assert_eq!(interactions[0].period, "parent:period[P2]");
    assert_eq!(interactions[1].period, "parent:period[P3]");
    assert!((interactions[1].coefficient.unwrap() - 0.10).abs() < 0.01);
}

#[test]
fn test_hc1_policy_is_recorded() {
    let mut records = year_of_records(2003, &[1, 6], 4, 2);
    records.extend(year_of_records(2010, &[1, 6], 4, 2));
    records.extend(year_of_records(2020, &[1, 6], 4, 2));
    let config = AnalysisConfig {
        cluster_se_by: ClusterBy::Unclustered,
        ..AnalysisConfig::default()
    };
    let build = panel_from_aggregation(aggregate(&records, StratifyBy::Pooled), &config).unwrap();
    let estimates = pipeline::estimate(&build.rows, &config).unwrap();
    for row in estimates.effects.to_effect_rows() {
        assert_eq!(row.status, "estimated");
        assert_eq!(row.se_policy.as_deref(), Some("hc1"));
        assert_eq!(row.clusters, row.n);
    }
}
