//! Arrow helpers

pub mod array_utils;

pub use array_utils::{CodeValue, code_values, downcast_array, float64_values, get_column, int64_values};
