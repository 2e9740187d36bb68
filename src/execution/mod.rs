mod expression_executor;
mod fragment_executor;
mod projection_evaluator;
mod volcano_executor;

use std::io;

use arrow::datatypes::DataType;
use arrow::error::ArrowError;
pub use expression_executor::*;
pub use fragment_executor::*;
pub use projection_evaluator::*;
pub use volcano_executor::*;

use crate::function::FunctionError;
use crate::runtime::{ChannelError, MemLimitExceeded};
use crate::types::{LogicalType, TypeError};

#[derive(thiserror::Error, Debug)]
pub enum ExecutorError {
    #[error("arrow error: {0}")]
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
    #[error("function error: {0}")]
    FunctionError(
        #[source]
        #[from]
        FunctionError,
    ),
    #[error("channel error: {0}")]
    ChannelError(
        #[source]
        #[from]
        ChannelError,
    ),
    #[error("{0}")]
    MemLimitExceeded(
        #[source]
        #[from]
        MemLimitExceeded,
    ),
    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: io::Error,
    },
    #[error("column {index} evaluated to {actual:?}, declared output type is {expected}")]
    TypeMismatch {
        index: usize,
        expected: LogicalType,
        actual: DataType,
    },
    #[error("execution cancelled")]
    Cancelled,
    #[error("Executor internal error: {0}")]
    InternalError(String),
}

impl ExecutorError {
    /// Whether the error only reflects the query being stopped, either cancelled
    /// or failed by another instance sharing a stream with this one.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            ExecutorError::Cancelled
                | ExecutorError::ChannelError(ChannelError::Cancelled(_))
                | ExecutorError::ChannelError(ChannelError::SenderFailed { .. })
        )
    }
}
