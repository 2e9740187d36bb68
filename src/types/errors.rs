use arrow::datatypes::DataType;

#[derive(thiserror::Error, Debug)]
pub enum TypeError {
    #[error("unsupported arrow data type: {0:?}")]
    UnsupportedDataType(DataType),
    #[error("can not convert '{value}' to {target}: {reason}")]
    Conversion {
        value: String,
        target: String,
        reason: String,
    },
    #[error("Internal error: {0}")]
    InternalError(String),
}
