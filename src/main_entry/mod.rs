mod errors;
mod query_executor;
mod result_cursor;

pub use errors::*;
pub use query_executor::*;
pub use result_cursor::*;
