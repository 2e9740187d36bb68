use std::sync::Arc;

use arrow::array::{Array, BooleanArray};
use arrow::compute::filter_record_batch;
use async_stream::try_stream;
use derive_new::new;

use crate::execution::{BoxedExecutor, ExecutorError, ExpressionExecutor};
use crate::planner::BoundExpression;
use crate::runtime::ExecutionContext;

#[derive(new)]
pub struct Filter {
    pub(crate) predicate: BoundExpression,
    pub(crate) child: BoxedExecutor,
}

impl Filter {
    pub fn execute(self, _context: Arc<ExecutionContext>) -> BoxedExecutor {
        let Filter { predicate, child } = self;
        Box::pin(try_stream! {
            for await batch in child {
                let batch = batch?;
                let eval_mask = ExpressionExecutor::execute_one(&predicate, &batch)?;
                let mask = eval_mask
                    .as_any()
                    .downcast_ref::<BooleanArray>()
                    .ok_or_else(|| {
                        ExecutorError::InternalError(format!(
                            "filter predicate evaluated to {:?}",
                            eval_mask.data_type()
                        ))
                    })?;
                yield filter_record_batch(&batch, mask)?;
            }
        })
    }
}
