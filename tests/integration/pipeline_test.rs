use absence_panel::io::{self, write_panel_to};
use absence_panel::pipeline::{self, RunOutputs};
use absence_panel::{AbsenceError, AnalysisConfig, MicrodataReader, RawRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::utils::{as_ill, as_parent, scratch_dir, worker, write_microdata};

/// Three periods, four states, every month of one year per period
fn extract(seed: u64) -> Vec<RawRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::new();
    for year in [2002, 2013, 2021] {
        for state in [4, 6, 36, 48] {
            for month in 1..=12 {
                for _ in 0..30 {
                    let mut record = RawRecord {
                        year: Some(year),
                        month: Some(month),
                        state: Some(state),
                        sex: Some(rng.random_range(1..=2)),
                        education: Some([73, 111][rng.random_range(0..2)]),
                        weight: Some(f64::from(rng.random_range(500..3000u32)) + 0.25),
                        ..worker(records.len() as u64)
                    };
                    let parent = rng.random_bool(0.5);
                    if parent {
                        record = as_parent(record);
                    }
                    if rng.random_bool(if parent { 0.06 } else { 0.03 }) {
                        record = as_ill(record);
                    }
                    records.push(record);
                }
            }
        }
    }
    // A few unusable rows
    let n = records.len() as u64;
    records.push(RawRecord {
        weight: None,
        ..worker(n)
    });
    records.push(RawRecord {
        state: Some(99),
        ..worker(n + 1)
    });
    records
}

#[test]
fn test_row_group_parallelism_does_not_change_the_panel() {
    let dir = scratch_dir("parallel");
    let input = dir.join("extract.parquet");
    write_microdata(&input, &extract(1), 250).unwrap();

    let reader = MicrodataReader::open(&input, 64).unwrap();
    assert!(reader.row_group_count() > 1);

    let serial = pipeline::build_panel(&input, &AnalysisConfig::default()).unwrap();
    let parallel = pipeline::build_panel(
        &input,
        &AnalysisConfig {
            threads: 4,
            batch_size: 100,
            ..AnalysisConfig::default()
        },
    )
    .unwrap();
    assert_eq!(serial, parallel);
    assert_eq!(serial.counts.invalid(), 2);
    assert_eq!(serial.counts.invalid_by_field.get("WTFINL"), Some(&1));
    assert_eq!(serial.counts.invalid_by_field.get("STATEFIP"), Some(&1));
}

#[test]
fn test_panel_bytes_are_identical_across_builds() {
    let dir = scratch_dir("determinism");
    let input = dir.join("extract.parquet");
    write_microdata(&input, &extract(2), 300).unwrap();
    let config = AnalysisConfig {
        threads: 3,
        ..AnalysisConfig::default()
    };

    let encode = || {
        let build = pipeline::build_panel(&input, &config).unwrap();
        let mut buf = Vec::new();
        write_panel_to(&mut buf, &build.rows, &config).unwrap();
        buf
    };
    let first = encode();
    let second = encode();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_run_writes_every_artifact() {
    let dir = scratch_dir("run");
    let input = dir.join("extract.parquet");
    write_microdata(&input, &extract(3), 500).unwrap();

    let outputs = RunOutputs {
        panel: dir.join("panel.parquet"),
        effects: dir.join("effects.csv"),
        interactions: Some(dir.join("interactions.parquet")),
        summary: Some(dir.join("summary.json")),
    };
    let config = AnalysisConfig::default();
    let summary = pipeline::run(&input, &outputs, &config).unwrap();
    assert!(summary.is_complete(), "{:?}", summary.failed_periods);
    assert_eq!(summary.periods.len(), 3);
    assert_eq!(summary.records.invalid(), 2);

    let panel = io::read_panel(&outputs.panel).unwrap();
    assert_eq!(panel.rows.len(), summary.panel_rows);
    assert_eq!(panel.parent_definition(), Some("any_child"));

    let effects = std::fs::read_to_string(&outputs.effects).unwrap();
    let mut lines = effects.lines();
    assert_eq!(
        lines.next(),
        Some("period,status,coefficient,std_error,ci_low,ci_high,n,clusters,r_squared,se_policy,message")
    );
    assert_eq!(lines.count(), 3);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(outputs.summary.as_ref().unwrap()).unwrap()).unwrap();
    assert_eq!(json["failed_periods"].as_array().map(Vec::len), Some(0));
    assert_eq!(json["config"]["cluster_se_by"], "state");
}

#[test]
fn test_missing_column_is_reported_before_reading() {
    let dir = scratch_dir("schema");
    let input = dir.join("narrow.parquet");
    let batch = crate::utils::microdata_batch(&[worker(0)]);
    let narrow = batch.project(&[0, 1, 2]).unwrap();
    let file = std::fs::File::create(&input).unwrap();
    let mut writer = parquet::arrow::ArrowWriter::try_new(file, narrow.schema(), None).unwrap();
    writer.write(&narrow).unwrap();
    writer.close().unwrap();

    match MicrodataReader::open(&input, 1024) {
        Err(AbsenceError::Schema(message)) => assert!(message.contains("WTFINL")),
        other => panic!("expected Schema error, got {other:?}"),
    }
}

#[test]
fn test_ineligible_record_before_first_period_aborts_build() {
    let dir = scratch_dir("unbounded");
    let input = dir.join("extract.parquet");
    let mut records = extract(4);
    let n = records.len() as u64;
    records.push(RawRecord {
        year: Some(1992),
        month: Some(6),
        age: Some(60),
        ..worker(n)
    });
    write_microdata(&input, &records, 400).unwrap();

    match pipeline::build_panel(&input, &AnalysisConfig::default()) {
        Err(AbsenceError::UnboundedDate { year, month }) => assert_eq!((year, month), (1992, 6)),
        other => panic!("expected UnboundedDate, got {other:?}"),
    }
}
