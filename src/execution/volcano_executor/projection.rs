use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use async_stream::try_stream;
use derive_new::new;

use crate::execution::{BoxedExecutor, ExpressionExecutor};
use crate::planner::BoundExpression;
use crate::runtime::ExecutionContext;

#[derive(new)]
pub struct Projection {
    pub(crate) schema: SchemaRef,
    pub(crate) exprs: Vec<BoundExpression>,
    pub(crate) child: BoxedExecutor,
}

impl Projection {
    pub fn execute(self, _context: Arc<ExecutionContext>) -> BoxedExecutor {
        let Projection {
            schema,
            exprs,
            child,
        } = self;
        Box::pin(try_stream! {
            for await batch in child {
                let batch = batch?;
                let columns = ExpressionExecutor::execute(&exprs, &batch)?;
                let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
                yield RecordBatch::try_new_with_options(schema.clone(), columns, &options)?;
            }
        })
    }
}
