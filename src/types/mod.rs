mod errors;
mod logical_type;
mod scalar;

pub use errors::*;
pub use logical_type::*;
pub use scalar::*;
