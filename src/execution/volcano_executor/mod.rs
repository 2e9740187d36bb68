mod exchange;
mod filter;
mod limit;
mod projection;
mod text_scan;

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use derive_new::new;
pub use exchange::*;
pub use filter::*;
use futures::stream::BoxStream;
pub use limit::*;
pub use projection::*;
pub use text_scan::*;

use super::ExecutorError;
use crate::planner::{PlanNode, ScanRange};
use crate::runtime::{ExecutionContext, RowBatchQueue};

pub type BoxedExecutor = BoxStream<'static, Result<RecordBatch, ExecutorError>>;

/// Builds the pull-based operator tree of one fragment instance.
#[derive(new)]
pub struct VolcanoExecutor {
    scan_ranges: Vec<ScanRange>,
    /// The stream feeding this instance's exchange, if the fragment has one.
    exchange_input: Option<Arc<RowBatchQueue>>,
}

impl VolcanoExecutor {
    pub fn build(
        &self,
        plan: &PlanNode,
        context: Arc<ExecutionContext>,
    ) -> Result<BoxedExecutor, ExecutorError> {
        Ok(match plan {
            PlanNode::TextScan(node) => {
                TextScan::new(node.clone(), self.scan_ranges.clone()).execute(context)
            }
            PlanNode::Exchange(node) => {
                let queue = self.exchange_input.clone().ok_or_else(|| {
                    ExecutorError::InternalError(format!(
                        "no input stream for exchange from {}",
                        node.source
                    ))
                })?;
                Exchange::new(node.clone(), queue).execute(context)
            }
            PlanNode::Filter(node) => {
                let child_executor = self.build(&node.child, context.clone())?;
                Filter::new(node.predicate.clone(), child_executor).execute(context)
            }
            PlanNode::Project(node) => {
                let child_executor = self.build(&node.child, context.clone())?;
                Projection::new(plan.schema(), node.exprs.clone(), child_executor)
                    .execute(context)
            }
            PlanNode::Limit(node) => {
                let child_executor = self.build(&node.child, context.clone())?;
                Limit::new(node.limit, node.offset, child_executor).execute(context)
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use crate::common::{FragmentId, FragmentInstanceId, QueryId};
    use crate::runtime::{ExecConfig, ExecutionContext};

    pub(crate) fn test_context() -> Arc<ExecutionContext> {
        test_context_with(ExecConfig::default())
    }

    pub(crate) fn test_context_with(config: ExecConfig) -> Arc<ExecutionContext> {
        let id = FragmentInstanceId::new(QueryId::next(), FragmentId(1), 0);
        ExecutionContext::new(id, config, Arc::new(AtomicBool::new(false)))
    }
}
