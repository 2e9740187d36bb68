use std::sync::Arc;

use async_stream::try_stream;
use derive_new::new;

use crate::execution::{BoxedExecutor, ExecutorError};
use crate::planner::ExchangeNode;
use crate::runtime::{ExecutionContext, RowBatchQueue};

/// Pulls the batches every instance of the source fragment streams into this instance.
///
/// Receiving blocks the instance thread while the queue is empty.
#[derive(new)]
pub struct Exchange {
    pub(crate) node: ExchangeNode,
    pub(crate) queue: Arc<RowBatchQueue>,
}

impl Exchange {
    pub fn execute(self, context: Arc<ExecutionContext>) -> BoxedExecutor {
        let Exchange { node, queue } = self;
        Box::pin(try_stream! {
            loop {
                if context.is_cancelled() {
                    Err(ExecutorError::Cancelled)?;
                }
                match queue.receive()? {
                    Some(batch) => {
                        if batch.num_columns() != node.types.len() {
                            Err(ExecutorError::InternalError(format!(
                                "corrupted batch from {}: {} columns, expected {}",
                                node.source,
                                batch.num_columns(),
                                node.types.len()
                            )))?;
                        }
                        context.add_rows_read(batch.num_rows());
                        yield batch;
                    }
                    None => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use futures::TryStreamExt;

    use super::*;
    use crate::common::FragmentId;
    use crate::execution::test_util::test_context;
    use crate::runtime::{ChannelError, CloseReason};
    use crate::types::LogicalType;

    fn batch(v: i64) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, true)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![v]))]).unwrap()
    }

    fn node() -> ExchangeNode {
        ExchangeNode::new(FragmentId(2), vec!["x".to_string()], vec![LogicalType::Bigint])
    }

    #[tokio::test]
    async fn drains_all_senders() {
        let context = test_context();
        let queue = RowBatchQueue::new(context.instance_id(), 1, 2);
        let senders = (0..2)
            .map(|i| {
                let queue = queue.clone();
                thread::spawn(move || {
                    queue.send(batch(i)).unwrap();
                    queue.sender_done();
                })
            })
            .collect::<Vec<_>>();
        let output = Exchange::new(node(), queue)
            .execute(context.clone())
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        for sender in senders {
            sender.join().unwrap();
        }
        assert_eq!(output.len(), 2);
        assert_eq!(context.build_profile().counter("RowsRead"), Some(2));
    }

    #[tokio::test]
    async fn sender_failure_stops_the_receiver() {
        let context = test_context();
        let queue = RowBatchQueue::new(context.instance_id(), 1, 1);
        queue.close(CloseReason::SenderFailed("disk on fire".to_string()));
        let err = Exchange::new(node(), queue)
            .execute(context)
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::ChannelError(ChannelError::SenderFailed { .. })
        ));
        // the failing sender owns the error, the receiver only stops
        assert!(err.is_cancellation());
    }
}
