use crate::common::FragmentId;
use crate::types::LogicalType;

/// A structurally invalid execution request; nothing has been started when it is returned.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RequestError {
    #[error("duplicate fragment id {0}")]
    DuplicateFragment(FragmentId),
    #[error("expected exactly one coordinator fragment, found {0}")]
    CoordinatorCount(usize),
    #[error("coordinator fragment {0} must write the query result with a single instance")]
    InvalidCoordinator(FragmentId),
    #[error("fragment {0} is not the coordinator but writes the query result")]
    UnexpectedResultSink(FragmentId),
    #[error("fragment {0} has no instances")]
    NoInstances(FragmentId),
    #[error("fragment {fragment} streams into unknown fragment {dest}")]
    UnknownDestination { fragment: FragmentId, dest: FragmentId },
    #[error("fragment {0} streams into itself")]
    SelfDestination(FragmentId),
    #[error("fragment {0} has more than one exchange")]
    MultipleExchanges(FragmentId),
    #[error("exchange in fragment {fragment} reads {source_fragment}, which does not stream into it")]
    UnconnectedExchange {
        fragment: FragmentId,
        source_fragment: FragmentId,
    },
    #[error("fragment {fragment} streams into {dest}, which has no exchange reading it")]
    UnconsumedStream { fragment: FragmentId, dest: FragmentId },
    #[error("select list has {exprs} expressions but {types} output types")]
    OutputArity { exprs: usize, types: usize },
    #[error("select list expression {index} returns {actual}, declared output type is {expected}")]
    OutputType {
        index: usize,
        expected: LogicalType,
        actual: LogicalType,
    },
    #[error("select list expression {index} reads column {column}, input has {width} columns")]
    ColumnOutOfRange {
        index: usize,
        column: usize,
        width: usize,
    },
    #[error("request has remote fragments but no backends are configured")]
    NoBackends,
}
