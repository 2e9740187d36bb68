use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::debug;
use parking_lot::Mutex;

use super::{CoordinatorError, InstanceReport, QueryControl};
use crate::common::{FragmentInstanceId, WorkerId};
use crate::execution::{FragmentExecutor, FragmentInstanceRequest};
use crate::runtime::{DataStreamMgr, ExecConfig, ExecutionContext, InstanceStatus};

/// Delivers a finished instance's report back to the coordinator of its query.
#[derive(Clone)]
pub struct StatusReporter {
    control: Arc<QueryControl>,
}

impl StatusReporter {
    pub(crate) fn new(control: Arc<QueryControl>) -> Self {
        StatusReporter { control }
    }

    pub fn report(&self, report: InstanceReport) {
        self.control.on_report(report);
    }
}

/// The worker-side surface the coordinator schedules fragment instances on.
pub trait ExecBackend: Send + Sync {
    /// Starts `request` on `worker`. Returns once the instance is accepted; its
    /// completion arrives later through `reporter`.
    fn submit_fragment(
        &self,
        worker: WorkerId,
        request: FragmentInstanceRequest,
        reporter: StatusReporter,
    ) -> Result<(), CoordinatorError>;

    /// Asks a running instance to stop. Unknown or finished instances are ignored.
    fn cancel_fragment(&self, instance: FragmentInstanceId);
}

/// Runs every submitted instance on its own thread of this process, exchanging
/// row batches through a shared [`DataStreamMgr`].
pub struct InProcessBackend {
    stream_mgr: Arc<DataStreamMgr>,
    config: ExecConfig,
    running: Arc<Mutex<HashMap<FragmentInstanceId, Arc<AtomicBool>>>>,
}

impl InProcessBackend {
    pub fn new(stream_mgr: Arc<DataStreamMgr>, config: ExecConfig) -> Arc<Self> {
        Arc::new(InProcessBackend {
            stream_mgr,
            config,
            running: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn num_running(&self) -> usize {
        self.running.lock().len()
    }

    fn run_instance(
        request: &FragmentInstanceRequest,
        context: Arc<ExecutionContext>,
        stream_mgr: &DataStreamMgr,
    ) -> InstanceStatus {
        match FragmentExecutor::open(request, context.clone(), stream_mgr, None) {
            Ok(executor) => executor.run(),
            Err(e) => {
                let status = if e.is_cancellation() || context.is_cancelled() {
                    InstanceStatus::Cancelled
                } else {
                    InstanceStatus::Failed(e.to_string())
                };
                context.set_status(status.clone());
                status
            }
        }
    }
}

impl ExecBackend for InProcessBackend {
    fn submit_fragment(
        &self,
        worker: WorkerId,
        request: FragmentInstanceRequest,
        reporter: StatusReporter,
    ) -> Result<(), CoordinatorError> {
        let instance = request.instance_id();
        let cancelled = Arc::new(AtomicBool::new(false));
        self.running.lock().insert(instance, cancelled.clone());

        let context = ExecutionContext::new(instance, self.config.clone(), cancelled);
        let stream_mgr = self.stream_mgr.clone();
        let running = self.running.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", worker, instance))
            .spawn(move || {
                let status = Self::run_instance(&request, context.clone(), &stream_mgr);
                running.lock().remove(&instance);
                reporter.report(InstanceReport::from_context(&context, status));
            });

        match spawned {
            Ok(_) => {
                debug!("instance {} submitted to {}", instance, worker);
                Ok(())
            }
            Err(e) => {
                self.running.lock().remove(&instance);
                Err(CoordinatorError::SubmitFailed {
                    instance,
                    worker,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn cancel_fragment(&self, instance: FragmentInstanceId) {
        match self.running.lock().get(&instance) {
            Some(flag) => flag.store(true, Ordering::Release),
            None => debug!("cancel of instance {} ignored: not running", instance),
        }
    }
}
