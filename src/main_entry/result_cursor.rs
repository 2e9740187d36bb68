use arrow::record_batch::RecordBatch;
use log::debug;

use super::QueryError;
use crate::coordinator::Coordinator;
use crate::execution::ProjectionEvaluator;
use crate::types::ScalarValue;
use crate::util::row_to_string;

const ROW_DELIMITER: &str = ",";

/// How a cursor hands out its rows; fixed by the first fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum FetchMode {
    #[strum(serialize = "batch")]
    Batch,
    #[strum(serialize = "row")]
    Row,
}

/// Pulls a query's output from its coordinator and applies the select list.
///
/// Rows can be fetched as whole batches or one at a time, as text or as values.
/// Text and value fetches share the row position and may be interleaved; batch
/// fetches cannot be mixed with them on the same cursor.
pub struct ResultCursor {
    coordinator: Coordinator,
    evaluator: ProjectionEvaluator,
    mode: Option<FetchMode>,
    current: Option<RecordBatch>,
    position: usize,
    eos: bool,
    num_rows_returned: u64,
}

impl ResultCursor {
    pub fn new(coordinator: Coordinator, evaluator: ProjectionEvaluator) -> Self {
        ResultCursor {
            coordinator,
            evaluator,
            mode: None,
            current: None,
            position: 0,
            eos: false,
            num_rows_returned: 0,
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Once true, every further fetch reports end of stream.
    pub fn eos(&self) -> bool {
        self.eos
    }

    pub fn num_rows_returned(&self) -> u64 {
        self.num_rows_returned
    }

    fn lock_mode(&mut self, requested: FetchMode) -> Result<(), QueryError> {
        match self.mode {
            None => {
                self.mode = Some(requested);
                Ok(())
            }
            Some(locked) if locked == requested => Ok(()),
            Some(locked) => Err(QueryError::FetchModeMismatch { locked, requested }),
        }
    }

    /// The next non-empty projected batch, or `None` at end of stream.
    fn next_projected(&mut self) -> Result<Option<RecordBatch>, QueryError> {
        if self.eos {
            return Ok(None);
        }
        loop {
            let batch = match self.coordinator.get_next_batch()? {
                Some(batch) => batch,
                None => {
                    debug!("result cursor reached end of stream");
                    self.eos = true;
                    self.current = None;
                    return Ok(None);
                }
            };
            if batch.num_rows() == 0 {
                continue;
            }
            return match self.evaluator.evaluate(&batch) {
                Ok(projected) => Ok(Some(projected)),
                Err(e) => {
                    self.coordinator.report_fatal(e.to_string());
                    Err(e.into())
                }
            };
        }
    }

    pub fn fetch_batch(&mut self) -> Result<Option<RecordBatch>, QueryError> {
        self.lock_mode(FetchMode::Batch)?;
        let batch = self.next_projected()?;
        if let Some(batch) = &batch {
            self.num_rows_returned += batch.num_rows() as u64;
        }
        self.current = batch.clone();
        Ok(batch)
    }

    /// Positions the cursor on the next row and returns its batch and index.
    fn advance_row(&mut self) -> Result<Option<(RecordBatch, usize)>, QueryError> {
        self.lock_mode(FetchMode::Row)?;
        if !self.eos {
            self.coordinator.check_status()?;
        }
        loop {
            if let Some(batch) = &self.current {
                if self.position < batch.num_rows() {
                    let row = self.position;
                    self.position += 1;
                    self.num_rows_returned += 1;
                    return Ok(Some((batch.clone(), row)));
                }
            }
            self.position = 0;
            self.current = self.next_projected()?;
            if self.current.is_none() {
                return Ok(None);
            }
        }
    }

    /// The next row as comma-separated text, NULL shown as `NULL`.
    pub fn fetch_row_as_text(&mut self) -> Result<Option<String>, QueryError> {
        match self.advance_row()? {
            Some((batch, row)) => Ok(Some(row_to_string(&batch, row, ROW_DELIMITER)?)),
            None => Ok(None),
        }
    }

    pub fn fetch_row_as_values(&mut self) -> Result<Option<Vec<ScalarValue>>, QueryError> {
        match self.advance_row()? {
            Some((batch, row)) => {
                let values = batch
                    .columns()
                    .iter()
                    .map(|column| ScalarValue::try_from_array(column, row))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Some(values))
            }
            None => Ok(None),
        }
    }

    pub fn shutdown(&mut self) {
        self.current = None;
        self.coordinator.shutdown();
    }
}
