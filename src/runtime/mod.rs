mod config;
mod data_stream;
mod exec_context;
mod mem_tracker;
mod profile;

pub use config::*;
pub use data_stream::*;
pub use exec_context::*;
pub use mem_tracker::*;
pub use profile::*;
