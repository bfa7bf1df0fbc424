use std::path::{Path, PathBuf};
use std::sync::Arc;

use absence_panel::models::record::columns;
use absence_panel::{RawRecord, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

/// Scratch directory unique to this test process
#[must_use]
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join(format!("absence-panel-tests-{}", std::process::id()))
        .join(name);
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

/// An eligible, non-parent worker at work in January 1994, state 6
#[must_use]
pub fn worker(row: u64) -> RawRecord {
    RawRecord {
        row,
        year: Some(1994),
        month: Some(1),
        state: Some(6),
        age: Some(35),
        sex: Some(1),
        education: Some(73),
        employment_status: Some(10),
        usual_hours: Some(40),
        class_of_worker: Some(21),
        absent: Some(1),
        absence_reason: Some(0),
        child_count: Some(0),
        child_under5_count: Some(0),
        mother_link: Some(0),
        father_link: Some(0),
        weight: Some(1.0),
        malformed: None,
    }
}

/// Make `record` a parent of one school-age child
#[must_use]
pub fn as_parent(record: RawRecord) -> RawRecord {
    RawRecord {
        child_count: Some(1),
        ..record
    }
}

/// Make `record` absent from work for own illness
#[must_use]
pub fn as_ill(record: RawRecord) -> RawRecord {
    RawRecord {
        employment_status: Some(12),
        absent: Some(3),
        absence_reason: Some(8),
        ..record
    }
}

/// Records as an Arrow batch with the extract's column names
#[must_use]
pub fn microdata_batch(records: &[RawRecord]) -> RecordBatch {
    let coded = |f: fn(&RawRecord) -> Option<i64>| -> ArrayRef {
        Arc::new(records.iter().map(f).collect::<Int64Array>())
    };
    let arrays: Vec<ArrayRef> = vec![
        coded(|r| r.year),
        coded(|r| r.month),
        coded(|r| r.state),
        coded(|r| r.age),
        coded(|r| r.sex),
        coded(|r| r.education),
        coded(|r| r.employment_status),
        coded(|r| r.usual_hours),
        coded(|r| r.class_of_worker),
        coded(|r| r.absent),
        coded(|r| r.absence_reason),
        coded(|r| r.child_count),
        coded(|r| r.child_under5_count),
        coded(|r| r.mother_link),
        coded(|r| r.father_link),
        Arc::new(records.iter().map(|r| r.weight).collect::<Float64Array>()),
    ];

    let mut fields: Vec<Field> = columns::CODED
        .iter()
        .map(|name| Field::new(*name, DataType::Int64, true))
        .collect();
    fields.push(Field::new(columns::WEIGHT, DataType::Float64, true));
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).expect("microdata batch")
}

/// Write records as Parquet with at most `row_group_size` rows per group
pub fn write_microdata(path: &Path, records: &[RawRecord], row_group_size: usize) -> Result<()> {
    let batch = microdata_batch(records);
    let props = WriterProperties::builder()
        .set_max_row_group_size(row_group_size)
        .build();
    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
