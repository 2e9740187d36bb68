mod tree_render;

use std::collections::HashMap;

use arrow::array::Array;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use arrow::util::pretty::pretty_format_batches;
pub use tree_render::*;

use crate::types::LogicalType;

pub struct SchemaUtil;

impl SchemaUtil {
    pub fn new_schema_ref(names: &[String], types: &[LogicalType]) -> SchemaRef {
        let fields = names
            .iter()
            .zip(types.iter())
            .map(|(name, ty)| Field::new(name.as_str(), DataType::from(*ty), true))
            .collect::<Vec<_>>();
        SchemaRef::new(Schema::new_with_metadata(fields, HashMap::new()))
    }
}

pub fn pretty_batches(batches: &[RecordBatch]) -> Result<String, ArrowError> {
    Ok(pretty_format_batches(batches)?.to_string())
}

/// Renders one row of `batch` as a delimited text line.
/// NULL values are rendered as "NULL".
pub fn row_to_string(batch: &RecordBatch, row: usize, delimiter: &str) -> Result<String, ArrowError> {
    let mut output = String::new();
    for (col, column) in batch.columns().iter().enumerate() {
        if col != 0 {
            output.push_str(delimiter);
        }
        if column.is_null(row) {
            output.push_str("NULL");
            continue;
        }
        output.push_str(&array_value_to_string(column, row)?);
    }
    Ok(output)
}

/// Renders every row of `batch`, one comma delimited line per row.
pub fn record_batch_to_string(batch: &RecordBatch) -> Result<String, ArrowError> {
    let mut output = String::new();
    for row in 0..batch.num_rows() {
        output.push_str(&row_to_string(batch, row, ",")?);
        output.push('\n');
    }
    Ok(output)
}
