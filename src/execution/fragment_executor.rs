use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use derive_new::new;
use futures::executor::block_on_stream;
use log::{debug, error, info};

use super::{BoxedExecutor, ExecutorError, VolcanoExecutor};
use crate::common::FragmentInstanceId;
use crate::planner::{DataSink, FragmentInstanceParams, OutputPartition, PlanFragment};
use crate::runtime::{
    ChannelError, CloseReason, DataStreamMgr, ExecutionContext, InstanceStatus, RowBatchQueue,
};
use crate::util::TreeRender;

/// Everything a worker needs to run one fragment instance.
#[derive(new, Debug, Clone)]
pub struct FragmentInstanceRequest {
    pub(crate) instance_id: FragmentInstanceId,
    pub(crate) fragment: Arc<PlanFragment>,
    pub(crate) params: FragmentInstanceParams,
    /// Instances of the destination fragment, for a streaming sink.
    pub(crate) destinations: Vec<FragmentInstanceId>,
}

impl FragmentInstanceRequest {
    pub fn instance_id(&self) -> FragmentInstanceId {
        self.instance_id
    }
}

enum OutputSink {
    Result(Arc<RowBatchQueue>),
    Stream {
        partition: OutputPartition,
        destinations: Vec<Arc<RowBatchQueue>>,
        next: usize,
    },
}

impl OutputSink {
    fn queues(&self) -> Vec<Arc<RowBatchQueue>> {
        match self {
            OutputSink::Result(queue) => vec![queue.clone()],
            OutputSink::Stream { destinations, .. } => destinations.clone(),
        }
    }
}

/// Runs one fragment instance to completion on the calling thread.
pub struct FragmentExecutor {
    context: Arc<ExecutionContext>,
    root: Option<BoxedExecutor>,
    inputs: Vec<Arc<RowBatchQueue>>,
    sink: OutputSink,
}

impl FragmentExecutor {
    /// Resolves the instance's streams and builds its operator tree.
    ///
    /// `result_queue` receives the output of the coordinator fragment.
    pub fn open(
        request: &FragmentInstanceRequest,
        context: Arc<ExecutionContext>,
        stream_mgr: &DataStreamMgr,
        result_queue: Option<Arc<RowBatchQueue>>,
    ) -> Result<Self, ExecutorError> {
        let fragment = &request.fragment;
        debug!(
            "opening instance {}:\n{}",
            request.instance_id,
            TreeRender::plan_tree(&fragment.root)
        );

        let exchange_input = if fragment.root.exchange_sources().is_empty() {
            None
        } else {
            Some(stream_mgr.get(request.instance_id)?)
        };
        let inputs = exchange_input.iter().cloned().collect();

        let sink = match &fragment.sink {
            DataSink::Result => OutputSink::Result(result_queue.ok_or_else(|| {
                ExecutorError::InternalError(format!(
                    "no result buffer for coordinator instance {}",
                    request.instance_id
                ))
            })?),
            DataSink::Stream { partition, .. } => {
                let destinations = request
                    .destinations
                    .iter()
                    .map(|dest| stream_mgr.get(*dest))
                    .collect::<Result<Vec<_>, ChannelError>>()?;
                if destinations.is_empty() {
                    return Err(ExecutorError::InternalError(format!(
                        "instance {} has no destinations",
                        request.instance_id
                    )));
                }
                OutputSink::Stream {
                    partition: *partition,
                    destinations,
                    next: 0,
                }
            }
        };

        let builder = VolcanoExecutor::new(request.params.scan_ranges.clone(), exchange_input);
        let root = builder.build(&fragment.root, context.clone())?;
        Ok(FragmentExecutor {
            context,
            root: Some(root),
            inputs,
            sink,
        })
    }

    /// Queues `batch` on one stream. Returns false when the receiver has closed it.
    fn deliver(
        context: &ExecutionContext,
        queue: &RowBatchQueue,
        batch: RecordBatch,
    ) -> Result<bool, ExecutorError> {
        let reservation = context
            .mem_tracker()
            .try_consume(batch.get_array_memory_size())?;
        match queue.send_reserved(batch, reservation) {
            Ok(()) => {
                context.add_batches_sent(1);
                Ok(true)
            }
            Err(ChannelError::Closed(dest)) => {
                debug!("receiver {} no longer needs input", dest);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Hands `batch` to the sink. Returns false once no receiver needs more input.
    fn send(&mut self, batch: RecordBatch) -> Result<bool, ExecutorError> {
        let context = &self.context;
        match &mut self.sink {
            OutputSink::Result(queue) => Self::deliver(context, queue, batch),
            OutputSink::Stream {
                partition: OutputPartition::Unpartitioned,
                destinations,
                ..
            } => {
                let mut idx = 0;
                while idx < destinations.len() {
                    if Self::deliver(context, &destinations[idx], batch.clone())? {
                        idx += 1;
                    } else {
                        destinations.remove(idx);
                    }
                }
                Ok(!destinations.is_empty())
            }
            OutputSink::Stream {
                partition: OutputPartition::Random,
                destinations,
                next,
            } => {
                while !destinations.is_empty() {
                    let idx = *next % destinations.len();
                    if Self::deliver(context, &destinations[idx], batch.clone())? {
                        *next = idx + 1;
                        break;
                    }
                    destinations.remove(idx);
                }
                Ok(!destinations.is_empty())
            }
        }
    }

    fn drive(&mut self) -> Result<(), ExecutorError> {
        let root = self
            .root
            .take()
            .ok_or_else(|| ExecutorError::InternalError("instance already ran".to_string()))?;
        for batch in block_on_stream(root) {
            let batch = batch?;
            if self.context.is_cancelled() {
                return Err(ExecutorError::Cancelled);
            }
            if batch.num_rows() == 0 {
                continue;
            }
            self.context.add_rows_returned(batch.num_rows());
            if !self.send(batch)? {
                break;
            }
        }
        Ok(())
    }

    /// Runs the instance until its input is exhausted, it fails or it is cancelled,
    /// then settles its output and input streams and records the terminal status.
    pub fn run(mut self) -> InstanceStatus {
        let instance_id = self.context.instance_id();
        info!("instance {} started", instance_id);

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.drive())).unwrap_or_else(
            |payload| {
                let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic payload".to_string()
                };
                Err(ExecutorError::InternalError(format!(
                    "panic in fragment execution: {}",
                    msg
                )))
            },
        );

        let status = match result {
            Ok(()) => InstanceStatus::Ok,
            Err(e) if e.is_cancellation() || self.context.is_cancelled() => {
                InstanceStatus::Cancelled
            }
            Err(e) => {
                error!("instance {} failed: {}", instance_id, e);
                InstanceStatus::Failed(e.to_string())
            }
        };

        for queue in self.sink.queues() {
            match &status {
                InstanceStatus::Ok => queue.sender_done(),
                InstanceStatus::Cancelled => queue.close(CloseReason::Cancelled),
                InstanceStatus::Failed(message) => {
                    queue.close(CloseReason::SenderFailed(message.clone()))
                }
            }
        }
        for queue in &self.inputs {
            queue.close(CloseReason::Closed);
        }

        info!("instance {} finished: {:?}", instance_id, status);
        self.context.set_status(status.clone());
        status
    }
}
