use arrow::error::ArrowError;

use super::FetchMode;
use crate::coordinator::CoordinatorError;
use crate::execution::ExecutorError;
use crate::types::TypeError;

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("{0}")]
    CoordinatorError(
        #[source]
        #[from]
        CoordinatorError,
    ),
    #[error("executor error: {0}")]
    ExecutorError(
        #[source]
        #[from]
        ExecutorError,
    ),
    #[error("Arrow error: {0}")]
    ArrowError(
        #[source]
        #[from]
        ArrowError,
    ),
    #[error("type error: {0}")]
    TypeError(
        #[source]
        #[from]
        TypeError,
    ),
    #[error("cursor fetches {locked} results, {requested} fetch is not allowed")]
    FetchModeMismatch {
        locked: FetchMode,
        requested: FetchMode,
    },
    #[error("no query is executing")]
    NotExecuting,
}

impl QueryError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, QueryError::CoordinatorError(e) if e.is_cancellation())
    }
}
