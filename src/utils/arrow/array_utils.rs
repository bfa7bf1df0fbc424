//! Column access with type adaptation
//!
//! Survey extracts store codes as whatever integer or float width the
//! exporting tool chose. Columns are cast to the width the pipeline works in
//! when they are read, so the rest of the code sees one type per column.

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array};
use arrow::compute::kernels::cast::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use log::debug;

use crate::error::{AbsenceError, Result};

/// Get a column cast to `expected_type`.
///
/// A missing column is a `Schema` error. Values that cannot be represented
/// in the target type become null rather than failing the batch.
pub fn get_column(batch: &RecordBatch, column_name: &str, expected_type: &DataType) -> Result<ArrayRef> {
    let idx = batch
        .schema()
        .index_of(column_name)
        .map_err(|_| AbsenceError::Schema(format!("required column {column_name} is missing")))?;

    let column = batch.column(idx);
    let actual_type = column.data_type();
    if actual_type == expected_type {
        return Ok(column.clone());
    }

    debug!("Converting column '{column_name}' from {actual_type:?} to {expected_type:?}");
    cast(column, expected_type).map_err(|err| {
        AbsenceError::Schema(format!(
            "column {column_name} of type {actual_type:?} cannot be read as {expected_type:?}: {err}"
        ))
    })
}

/// Downcast a column to a concrete array type
pub fn downcast_array<'a, A: Array + 'static>(array: &'a ArrayRef, column_name: &str) -> Result<&'a A> {
    array.as_any().downcast_ref::<A>().ok_or_else(|| {
        AbsenceError::Schema(format!(
            "column {column_name} has unexpected type {:?}",
            array.data_type()
        ))
    })
}

/// Column values as `Option<i64>`, nulls preserved
pub fn int64_values(batch: &RecordBatch, column_name: &str) -> Result<Vec<Option<i64>>> {
    let array = get_column(batch, column_name, &DataType::Int64)?;
    let values = downcast_array::<Int64Array>(&array, column_name)?;
    Ok(values.iter().collect())
}

/// Bounds of the floats that convert to `i64` exactly
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

/// A coded value: a whole number, null, or the offending non-integral value
pub type CodeValue = std::result::Result<Option<i64>, f64>;

/// Integer codes from an integer- or float-typed column.
///
/// Float columns are not truncated: a value with a fractional part, or one
/// outside the `i64` range, comes back as `Err(value)` so the row holding it
/// can be rejected.
pub fn code_values(batch: &RecordBatch, column_name: &str) -> Result<Vec<CodeValue>> {
    let idx = batch
        .schema()
        .index_of(column_name)
        .map_err(|_| AbsenceError::Schema(format!("required column {column_name} is missing")))?;
    if !batch.column(idx).data_type().is_floating() {
        return Ok(int64_values(batch, column_name)?.into_iter().map(Ok).collect());
    }

    Ok(float64_values(batch, column_name)?
        .into_iter()
        .map(|value| match value {
            None => Ok(None),
            Some(v) if v.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(&v) => Ok(Some(v as i64)),
            Some(v) => Err(v),
        })
        .collect())
}

/// Column values as `Option<f64>`, nulls preserved
pub fn float64_values(batch: &RecordBatch, column_name: &str) -> Result<Vec<Option<f64>>> {
    let array = get_column(batch, column_name, &DataType::Float64)?;
    let values = downcast_array::<Float64Array>(&array, column_name)?;
    Ok(values.iter().collect())
}
