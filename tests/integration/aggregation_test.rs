use absence_panel::algorithm::aggregate::{PanelAggregator, aggregate};
use absence_panel::pipeline::panel_from_aggregation;
use absence_panel::{AnalysisConfig, ClassifiedRecord, RawRecord, RecordClassifier, StratifyBy};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::utils::{as_ill, as_parent, worker};

fn january_1994() -> Vec<RawRecord> {
    let mut records = Vec::new();
    for i in 0..100u64 {
        let parent = as_parent(worker(i));
        records.push(if i < 5 { as_ill(parent) } else { parent });
    }
    for i in 0..100u64 {
        let other = worker(100 + i);
        records.push(if i < 2 { as_ill(other) } else { other });
    }
    records
}

fn classify_all(records: &[RawRecord]) -> Vec<ClassifiedRecord> {
    let classifier = RecordClassifier::new(&AnalysisConfig::default());
    records.iter().map(|r| classifier.classify(r).unwrap()).collect()
}

#[test]
fn test_january_1994_rates() {
    let config = AnalysisConfig::default();
    let output = aggregate(&classify_all(&january_1994()), StratifyBy::Pooled);
    let build = panel_from_aggregation(output, &config).unwrap();

    assert_eq!(build.rows.len(), 2);
    let non_parents = &build.rows[0];
    let parents = &build.rows[1];
    assert!(!non_parents.parent_status && parents.parent_status);
    assert!((parents.rate - 0.05).abs() < 1e-12);
    assert!((non_parents.rate - 0.02).abs() < 1e-12);
    assert_eq!(parents.denominator, 100.0);
    assert_eq!(parents.numerator, 5.0);
    assert_eq!(parents.period_label, "P1");
    assert_eq!(non_parents.period_label, "P1");
    assert_eq!(build.counts.eligible, 200);
}

fn random_records(rng: &mut StdRng, n: u64) -> Vec<ClassifiedRecord> {
    let raw: Vec<RawRecord> = (0..n)
        .map(|row| {
            let mut record = RawRecord {
                year: Some(rng.random_range(1994..=2024)),
                month: Some(rng.random_range(1..=12)),
                state: Some([1, 6, 17, 36, 48][rng.random_range(0..5)]),
                sex: Some(rng.random_range(1..=2)),
                education: Some([60, 73, 81, 111, 123][rng.random_range(0..5)]),
                weight: Some(f64::from(rng.random_range(1..=500_000u32)) / 97.0),
                ..worker(row)
            };
            if rng.random_bool(0.4) {
                record = as_parent(record);
            }
            if rng.random_bool(0.05) {
                record = as_ill(record);
            }
            record
        })
        .collect();
    classify_all(&raw)
}

#[test]
fn test_aggregation_is_order_and_partition_independent() {
    let mut rng = StdRng::seed_from_u64(2024);
    let records = random_records(&mut rng, 5_000);

    for stratify_by in [StratifyBy::Pooled, StratifyBy::Sex, StratifyBy::Education] {
        let reference = aggregate(&records, stratify_by);

        let mut shuffled = records.clone();
        shuffled.shuffle(&mut rng);
        assert_eq!(aggregate(&shuffled, stratify_by), reference);

        let parts = rng.random_range(2..8);
        let mut partials: Vec<PanelAggregator> =
            (0..parts).map(|_| PanelAggregator::new(stratify_by)).collect();
        for record in &shuffled {
            let target = rng.random_range(0..parts);
            partials[target].push(record);
        }
        partials.shuffle(&mut rng);
        let merged = partials
            .into_iter()
            .reduce(PanelAggregator::merge)
            .unwrap()
            .finish();
        assert_eq!(merged, reference, "stratify_by={stratify_by}");
    }
}

#[test]
fn test_every_cell_rate_is_a_proportion() {
    let mut rng = StdRng::seed_from_u64(11);
    let records = random_records(&mut rng, 3_000);
    let output = aggregate(&records, StratifyBy::Sex);
    assert!(!output.cells.is_empty());
    for cell in &output.cells {
        assert!(cell.totals.numerator <= cell.totals.denominator);
        let rate = cell.rate().unwrap();
        assert!((0.0..=1.0).contains(&rate));
    }
    assert!(output.cells.windows(2).all(|w| w[0].key < w[1].key));
}

#[test]
fn test_panel_rows_carry_configured_period_labels() {
    let mut rng = StdRng::seed_from_u64(5);
    let records = random_records(&mut rng, 2_000);
    let config = AnalysisConfig::default();
    let build = panel_from_aggregation(aggregate(&records, StratifyBy::Pooled), &config).unwrap();
    for row in &build.rows {
        let expected = match row.year {
            ..=2007 => "P1",
            2008..=2019 => "P2",
            _ => "P3",
        };
        assert_eq!(row.period_label, expected, "{}-{}", row.year, row.month);
    }
}
