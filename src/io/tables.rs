//! Parquet and CSV encoding of result tables

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use arrow_schema::Schema;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::file::metadata::KeyValue;
use parquet::file::reader::ChunkReader;

use crate::error::Result;
use crate::utils::arrow::get_column;

/// Write one batch as a Parquet file with key/value metadata
pub fn write_parquet<W: Write + Send>(
    sink: W,
    batch: &RecordBatch,
    metadata: &BTreeMap<String, String>,
) -> Result<()> {
    let key_values: Vec<KeyValue> = metadata
        .iter()
        .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
        .collect();
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata((!key_values.is_empty()).then_some(key_values))
        .build();

    let mut writer = ArrowWriter::try_new(sink, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Write one batch as CSV with a header row
pub fn write_csv<W: Write>(sink: W, batch: &RecordBatch) -> Result<()> {
    let mut writer = arrow::csv::WriterBuilder::new().with_header(true).build(sink);
    writer.write(batch)?;
    Ok(())
}

/// Read every batch of a Parquet source, cast to `schema`, plus its
/// key/value metadata
pub fn read_parquet<R: ChunkReader + 'static>(
    source: R,
    schema: &Schema,
) -> Result<(Vec<RecordBatch>, BTreeMap<String, String>)> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(source)?;
    let metadata = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .map(|kvs| {
            kvs.iter()
                .filter_map(|kv| kv.value.clone().map(|v| (kv.key.clone(), v)))
                .collect()
        })
        .unwrap_or_default();

    let batches = builder
        .build()?
        .map(|batch| conform(&batch?, schema))
        .collect::<Result<Vec<_>>>()?;
    Ok((batches, metadata))
}

/// Read a CSV source with a header row into batches of `schema`
pub fn read_csv<R: Read>(source: R, schema: &Schema) -> Result<Vec<RecordBatch>> {
    let reader = arrow::csv::ReaderBuilder::new(Arc::new(schema.clone()))
        .with_header(true)
        .build(source)?;
    Ok(reader.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Project and cast `batch` onto `schema`. Missing columns are a `Schema` error.
fn conform(batch: &RecordBatch, schema: &Schema) -> Result<RecordBatch> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| get_column(batch, field.name(), field.data_type()))
        .collect::<Result<Vec<_>>>()?;
    Ok(RecordBatch::try_new(Arc::new(schema.clone()), columns)?)
}
