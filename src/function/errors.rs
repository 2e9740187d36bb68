use arrow::error::ArrowError;

use crate::types::TypeError;

#[derive(thiserror::Error, Debug)]
pub enum FunctionError {
    #[error("type error: {0}")]
    TypeError(
        #[from]
        #[source]
        TypeError,
    ),
    #[error("arrow error: {0}")]
    ArrowError(
        #[from]
        #[source]
        ArrowError,
    ),
    #[error("function {name}({arguments}) is not registered")]
    NotFound { name: String, arguments: String },
    #[error("invalid argument for {name}: {reason}")]
    InvalidArgument { name: String, reason: String },
    #[error("Internal error: {0}")]
    InternalError(String),
}
