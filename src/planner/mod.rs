mod errors;
mod expression;
mod fragment;
mod plan_node;
mod request;

pub use errors::*;
pub use expression::*;
pub use fragment::*;
pub use plan_node::*;
pub use request::*;
