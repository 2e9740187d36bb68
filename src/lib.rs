pub mod common;
pub mod coordinator;
pub mod execution;
pub mod function;
pub mod main_entry;
pub mod planner;
pub mod runtime;
pub mod types;
pub mod util;

pub use self::main_entry::{QueryError, QueryExecutor};
