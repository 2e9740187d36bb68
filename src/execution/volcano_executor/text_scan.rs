use std::fs;
use std::sync::Arc;

use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use async_stream::try_stream;
use derive_new::new;
use log::debug;

use crate::execution::{BoxedExecutor, ExecutorError};
use crate::planner::{ScanRange, ScanSource, TextScanNode};
use crate::runtime::ExecutionContext;
use crate::types::{LogicalType, ScalarValue};
use crate::util::SchemaUtil;

/// Reads delimited text rows into typed batches.
///
/// A row whose field count or field values do not fit the schema is written to the
/// error log, counted against its file and skipped.
#[derive(new)]
pub struct TextScan {
    pub(crate) node: TextScanNode,
    pub(crate) scan_ranges: Vec<ScanRange>,
}

struct RowParseError {
    column: usize,
    detail: String,
}

impl TextScan {
    fn read_range(range: &ScanRange) -> Result<Arc<str>, ExecutorError> {
        match &range.source {
            ScanSource::Inline(text) => Ok(text.clone()),
            ScanSource::File(path) => fs::read_to_string(path)
                .map(Arc::from)
                .map_err(|source| ExecutorError::Io {
                    file: range.file_name.clone(),
                    source,
                }),
        }
    }

    fn parse_row(
        line: &str,
        delimiter: char,
        types: &[LogicalType],
    ) -> Result<Vec<ScalarValue>, RowParseError> {
        let fields = line.split(delimiter).collect::<Vec<_>>();
        if fields.len() != types.len() {
            return Err(RowParseError {
                column: fields.len().min(types.len()) + 1,
                detail: format!("expected {} fields, found {}", types.len(), fields.len()),
            });
        }
        fields
            .iter()
            .zip(types.iter())
            .enumerate()
            .map(|(idx, (field, ty))| {
                ScalarValue::try_from_str(field, *ty).map_err(|e| RowParseError {
                    column: idx + 1,
                    detail: e.to_string(),
                })
            })
            .collect()
    }

    fn build_batch(
        node: &TextScanNode,
        rows: Vec<Vec<ScalarValue>>,
    ) -> Result<RecordBatch, ExecutorError> {
        let num_rows = rows.len();
        let mut columns = vec![Vec::with_capacity(num_rows); node.types.len()];
        for row in rows {
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }
        let arrays = columns
            .into_iter()
            .zip(node.types.iter())
            .map(|(values, ty)| ScalarValue::iter_to_array(values, *ty))
            .collect::<Result<Vec<_>, _>>()?;
        let schema = SchemaUtil::new_schema_ref(&node.names, &node.types);
        let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
        Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
    }

    pub fn execute(self, context: Arc<ExecutionContext>) -> BoxedExecutor {
        let TextScan { node, scan_ranges } = self;
        let batch_size = context.config().batch_size.max(1);
        let delimiter = node.delimiter as char;

        Box::pin(try_stream! {
            for range in scan_ranges {
                let text = Self::read_range(&range)?;
                debug!(
                    "instance {} scanning {} ({} bytes)",
                    context.instance_id(),
                    range.file_name(),
                    text.len()
                );
                let mut rows = Vec::with_capacity(batch_size);
                for (idx, line) in text.lines().enumerate() {
                    if context.is_cancelled() {
                        Err(ExecutorError::Cancelled)?;
                    }
                    context.add_rows_read(1);
                    match Self::parse_row(line, delimiter, &node.types) {
                        Ok(row) => rows.push(row),
                        Err(e) => {
                            context.log_row_error(
                                range.file_name(),
                                format!(
                                    "Error parsing row: file: {}, line: {}, column {}: {} (Data is: {})",
                                    range.file_name(),
                                    idx + 1,
                                    e.column,
                                    e.detail,
                                    line
                                ),
                            );
                        }
                    }
                    if rows.len() >= batch_size {
                        yield Self::build_batch(&node, std::mem::take(&mut rows))?;
                    }
                }
                if !rows.is_empty() {
                    yield Self::build_batch(&node, rows)?;
                }
            }
        })
    }
}
