mod backend;
mod query_state;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arrow::record_batch::RecordBatch;
pub use backend::*;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
pub use query_state::*;

use crate::common::{FragmentId, FragmentInstanceId, QueryId, WorkerId};
use crate::execution::{
    ExecutorError, FragmentExecutor, FragmentInstanceRequest, ProjectionEvaluator,
};
use crate::planner::{DataSink, ExecutionRequest, PlanFragment, RequestError};
use crate::runtime::{
    ChannelError, CloseReason, DataStreamMgr, ExecConfig, ExecutionContext, InstanceStatus,
    RowBatchQueue, RuntimeProfile,
};

#[derive(thiserror::Error, Debug)]
pub enum CoordinatorError {
    #[error("invalid execution request: {0}")]
    InvalidRequest(
        #[source]
        #[from]
        RequestError,
    ),
    #[error("executor error: {0}")]
    ExecutorError(
        #[source]
        #[from]
        ExecutorError,
    ),
    #[error("channel error: {0}")]
    ChannelError(
        #[source]
        #[from]
        ChannelError,
    ),
    #[error("failed to start instance {instance} on {worker}: {reason}")]
    SubmitFailed {
        instance: FragmentInstanceId,
        worker: WorkerId,
        reason: String,
    },
    #[error("query {0} was cancelled")]
    Cancelled(QueryId),
    #[error("query {query} {status}")]
    QueryFailed { query: QueryId, status: QueryStatus },
    #[error("instances of query {query} did not finish within {timeout:?}")]
    CompletionTimeout { query: QueryId, timeout: Duration },
    #[error("no query has been executed")]
    NotExecuted,
    #[error("a query was already executed by this coordinator")]
    AlreadyExecuted,
}

impl CoordinatorError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CoordinatorError::Cancelled(_))
    }
}

fn status_result(query: QueryId, status: QueryStatus) -> Result<(), CoordinatorError> {
    match status {
        QueryStatus::Running | QueryStatus::Ok => Ok(()),
        QueryStatus::Cancelled => Err(CoordinatorError::Cancelled(query)),
        status @ QueryStatus::Failed { .. } => Err(CoordinatorError::QueryFailed { query, status }),
    }
}

/// State shared by the coordinator and the reporters of its instances.
pub(crate) struct QueryControl {
    state: Arc<QueryState>,
    stream_mgr: Arc<DataStreamMgr>,
    backend: Arc<dyn ExecBackend>,
    result_queue: Option<Arc<RowBatchQueue>>,
    remote_instances: Mutex<Vec<FragmentInstanceId>>,
}

impl QueryControl {
    fn query_id(&self) -> QueryId {
        self.state.query_id()
    }

    pub(crate) fn on_report(&self, report: InstanceReport) {
        let instance = report.instance;
        debug!("instance {} reported {:?}", instance, report.status);
        if self.state.record(report) {
            error!(
                "query {} failed in instance {}, cancelling remaining instances",
                self.query_id(),
                instance
            );
            self.stop_instances();
        }
    }

    /// Records a fatal error raised outside of any instance.
    fn fail(&self, message: String) {
        let status = QueryStatus::Failed {
            instance: None,
            message,
        };
        if self.state.set_terminal(status.clone()) {
            error!("query {} {}", self.query_id(), status);
            self.stop_instances();
        }
    }

    fn cancel(&self) {
        if self.state.set_terminal(QueryStatus::Cancelled) {
            info!("cancelling query {}", self.query_id());
            self.stop_instances();
        }
    }

    fn stop_instances(&self) {
        self.state.raise_cancel_flag();
        self.stream_mgr.cancel_query(self.query_id());
        if let Some(queue) = &self.result_queue {
            queue.close(CloseReason::Cancelled);
        }
        let remote = self.remote_instances.lock().clone();
        for instance in remote {
            self.backend.cancel_fragment(instance);
        }
    }
}

struct RunningQuery {
    query_id: QueryId,
    control: Arc<QueryControl>,
    local: Option<JoinHandle<()>>,
    /// Set until the single input row of a query without table source is handed out.
    pending_empty_row: bool,
}

/// Runs one query: sets up its streams, starts its fragment instances and hands
/// the coordinator fragment's output to the caller one batch at a time.
pub struct Coordinator {
    config: ExecConfig,
    stream_mgr: Arc<DataStreamMgr>,
    backend: Arc<dyn ExecBackend>,
    query: Option<RunningQuery>,
    shut_down: bool,
}

impl Coordinator {
    pub fn new(
        config: ExecConfig,
        stream_mgr: Arc<DataStreamMgr>,
        backend: Arc<dyn ExecBackend>,
    ) -> Self {
        Coordinator {
            config,
            stream_mgr,
            backend,
            query: None,
            shut_down: false,
        }
    }

    /// A coordinator whose remote instances run on threads of this process.
    pub fn in_process(config: ExecConfig) -> Self {
        let stream_mgr = DataStreamMgr::new();
        let backend = InProcessBackend::new(stream_mgr.clone(), config.clone());
        Coordinator::new(config, stream_mgr, backend)
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    pub fn query_id(&self) -> Option<QueryId> {
        self.query.as_ref().map(|q| q.query_id)
    }

    pub fn explain(&self, request: &ExecutionRequest) -> Result<String, CoordinatorError> {
        request.validate(self.config.num_backends)?;
        Ok(request.explain_string())
    }

    /// Validates `request`, registers its streams and starts every fragment instance.
    ///
    /// Returns once all instances are started; rows are pulled with
    /// [`Coordinator::get_next_batch`].
    pub fn exec(&mut self, request: &ExecutionRequest) -> Result<(), CoordinatorError> {
        if self.query.is_some() || self.shut_down {
            return Err(CoordinatorError::AlreadyExecuted);
        }
        request.validate(self.config.num_backends)?;
        let query_id = request.query_id();

        if !request.has_table_source() {
            info!("query {} has no table source", query_id);
            let control = self.new_control(QueryState::new(query_id, 0), None);
            self.query = Some(RunningQuery {
                query_id,
                control,
                local: None,
                pending_empty_row: true,
            });
            return Ok(());
        }

        let coordinator = request
            .coordinator_fragment()
            .ok_or(RequestError::CoordinatorCount(0))?;
        let instance_ids = request
            .fragments()
            .iter()
            .map(|f| {
                let ids = (0..f.num_instances())
                    .map(|seq| FragmentInstanceId::new(query_id, f.id(), seq as u32))
                    .collect::<Vec<_>>();
                (f.id(), ids)
            })
            .collect::<HashMap<_, _>>();
        let num_instances = instance_ids.values().map(Vec::len).sum();
        let local_id = FragmentInstanceId::new(query_id, coordinator.id(), 0);

        if let Err(e) = self.register_streams(request, &instance_ids) {
            self.stream_mgr.remove_query(query_id);
            return Err(e);
        }
        let result_queue = RowBatchQueue::new(local_id, self.config.channel_capacity, 1);
        let state = QueryState::new(query_id, num_instances);
        let control = self.new_control(state.clone(), Some(result_queue.clone()));

        let context = ExecutionContext::new(local_id, self.config.clone(), state.cancel_flag());
        let local_request = FragmentInstanceRequest::new(
            local_id,
            Arc::new(coordinator.clone()),
            coordinator.instances[0].clone(),
            vec![],
        );
        let executor = match FragmentExecutor::open(
            &local_request,
            context.clone(),
            &self.stream_mgr,
            Some(result_queue),
        ) {
            Ok(executor) => executor,
            Err(e) => {
                self.stream_mgr.remove_query(query_id);
                return Err(e.into());
            }
        };
        let reporter = StatusReporter::new(control.clone());
        let local = thread::Builder::new()
            .name(format!("coordinator-{}", local_id))
            .spawn(move || {
                let status = executor.run();
                reporter.report(InstanceReport::from_context(&context, status));
            })
            .map_err(|e| {
                self.stream_mgr.remove_query(query_id);
                CoordinatorError::SubmitFailed {
                    instance: local_id,
                    worker: WorkerId(0),
                    reason: e.to_string(),
                }
            })?;

        self.query = Some(RunningQuery {
            query_id,
            control: control.clone(),
            local: Some(local),
            pending_empty_row: false,
        });

        self.start_remote_instances(request, &instance_ids, &control)?;
        info!(
            "query {} started with {} instances",
            query_id, num_instances
        );
        Ok(())
    }

    fn new_control(
        &self,
        state: Arc<QueryState>,
        result_queue: Option<Arc<RowBatchQueue>>,
    ) -> Arc<QueryControl> {
        Arc::new(QueryControl {
            state,
            stream_mgr: self.stream_mgr.clone(),
            backend: self.backend.clone(),
            result_queue,
            remote_instances: Mutex::new(vec![]),
        })
    }

    /// One stream per instance reading an exchange, fed by every instance of the source fragment.
    fn register_streams(
        &self,
        request: &ExecutionRequest,
        instance_ids: &HashMap<FragmentId, Vec<FragmentInstanceId>>,
    ) -> Result<(), CoordinatorError> {
        for fragment in request.fragments() {
            for source in fragment.root.exchange_sources() {
                let num_senders = request
                    .fragment(source)
                    .map(PlanFragment::num_instances)
                    .unwrap_or_default();
                for dest in instance_ids.get(&fragment.id()).into_iter().flatten() {
                    self.stream_mgr
                        .register(*dest, num_senders, self.config.channel_capacity)?;
                }
            }
        }
        Ok(())
    }

    fn start_remote_instances(
        &self,
        request: &ExecutionRequest,
        instance_ids: &HashMap<FragmentId, Vec<FragmentInstanceId>>,
        control: &Arc<QueryControl>,
    ) -> Result<(), CoordinatorError> {
        let num_backends = self.config.num_backends.max(1);
        let reporter = StatusReporter::new(control.clone());
        let mut pending = vec![];
        for fragment in request.remote_fragments() {
            let destinations = match &fragment.sink {
                DataSink::Stream { dest, .. } => instance_ids.get(dest).cloned().unwrap_or_default(),
                DataSink::Result => vec![],
            };
            let shared = Arc::new(fragment.clone());
            for (instance, params) in instance_ids
                .get(&fragment.id())
                .into_iter()
                .flatten()
                .zip(fragment.instances.iter())
            {
                pending.push(FragmentInstanceRequest::new(
                    *instance,
                    shared.clone(),
                    params.clone(),
                    destinations.clone(),
                ));
            }
        }

        let mut requests = pending.into_iter().enumerate();
        while let Some((idx, instance_request)) = requests.next() {
            let worker = WorkerId((idx % num_backends) as u32);
            let instance = instance_request.instance_id();
            control.remote_instances.lock().push(instance);
            if let Err(e) = self
                .backend
                .submit_fragment(worker, instance_request, reporter.clone())
            {
                control.on_report(InstanceReport::not_started(
                    instance,
                    InstanceStatus::Failed(e.to_string()),
                ));
                for (_, skipped) in requests {
                    control.on_report(InstanceReport::not_started(
                        skipped.instance_id(),
                        InstanceStatus::Cancelled,
                    ));
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// The next batch of the coordinator fragment's output, or `None` once the
    /// query finished successfully.
    ///
    /// After a fatal error or cancellation the query's status is returned
    /// instead of data, including batches still buffered.
    pub fn get_next_batch(&mut self) -> Result<Option<RecordBatch>, CoordinatorError> {
        let timeout = self.config.shutdown_timeout;
        let query = self.query.as_mut().ok_or(CoordinatorError::NotExecuted)?;
        let query_id = query.query_id;
        let state = &query.control.state;
        status_result(query_id, state.status())?;

        let queue = match &query.control.result_queue {
            Some(queue) => queue,
            None => {
                if query.pending_empty_row {
                    query.pending_empty_row = false;
                    return Ok(Some(ProjectionEvaluator::empty_row()?));
                }
                state.finish();
                return Ok(None);
            }
        };

        match queue.receive() {
            Ok(Some(batch)) => Ok(Some(batch)),
            Ok(None) | Err(_) => {
                if !state.wait_for_completion(timeout) {
                    return Err(CoordinatorError::CompletionTimeout {
                        query: query_id,
                        timeout,
                    });
                }
                status_result(query_id, state.finish())?;
                Ok(None)
            }
        }
    }

    /// Fails with the query's status once it was cancelled or failed.
    pub fn check_status(&self) -> Result<(), CoordinatorError> {
        let query = self.query.as_ref().ok_or(CoordinatorError::NotExecuted)?;
        status_result(query.query_id, query.control.state.status())
    }

    pub fn status(&self) -> Option<QueryStatus> {
        self.query.as_ref().map(|q| q.control.state.status())
    }

    /// Stops every instance of a running query. Has no effect once the query finished.
    pub fn cancel(&self) {
        if let Some(query) = &self.query {
            query.control.cancel();
        }
    }

    /// Fails the query with an error raised while consuming its output.
    pub fn report_fatal(&self, message: String) {
        if let Some(query) = &self.query {
            query.control.fail(message);
        }
    }

    /// Error logs of the finished instances, in instance id order.
    pub fn error_log(&self) -> String {
        let Some(query) = &self.query else {
            return String::new();
        };
        query.control.state.with_reports(|reports| {
            reports
                .filter(|r| !r.error_log.is_empty())
                .map(|r| r.error_log.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
    }

    /// Rows skipped per input file, over the finished instances.
    pub fn file_errors(&self) -> BTreeMap<String, u64> {
        let mut merged = BTreeMap::new();
        if let Some(query) = &self.query {
            query.control.state.with_reports(|reports| {
                for report in reports {
                    for (file, count) in &report.file_errors {
                        *merged.entry(file.clone()).or_default() += count;
                    }
                }
            });
        }
        merged
    }

    pub fn num_errors(&self) -> usize {
        self.query
            .as_ref()
            .map(|q| {
                q.control
                    .state
                    .with_reports(|reports| reports.map(|r| r.num_errors).sum())
            })
            .unwrap_or_default()
    }

    pub fn num_instances(&self) -> usize {
        self.query
            .as_ref()
            .map(|q| q.control.state.expected_instances())
            .unwrap_or_default()
    }

    pub fn instance_statuses(&self) -> Vec<(FragmentInstanceId, InstanceStatus)> {
        self.query
            .as_ref()
            .map(|q| {
                q.control.state.with_reports(|reports| {
                    reports.map(|r| (r.instance, r.status.clone())).collect()
                })
            })
            .unwrap_or_default()
    }

    /// The query's profile with one child per finished instance.
    pub fn profile(&self) -> RuntimeProfile {
        let Some(query) = &self.query else {
            return RuntimeProfile::new("Query");
        };
        let mut profile = RuntimeProfile::new(format!("Query (id={})", query.query_id));
        profile.set_counter("NumInstances", query.control.state.expected_instances() as i64);
        query.control.state.with_reports(|reports| {
            for report in reports {
                profile.add_child(report.profile.clone());
            }
        });
        profile
    }

    /// Stops what is still running, waits for every instance to report and
    /// releases the query's streams. Calling it again does nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        let Some(query) = self.query.as_mut() else {
            return;
        };
        let control = query.control.clone();
        if !control.state.status().is_terminal() {
            control.cancel();
        }
        if let Some(queue) = &control.result_queue {
            queue.close(CloseReason::Closed);
        }
        if let Some(local) = query.local.take() {
            if local.join().is_err() {
                warn!("coordinator instance of query {} panicked", query.query_id);
            }
        }
        if !control.state.wait_for_completion(self.config.shutdown_timeout) {
            warn!(
                "query {}: not every instance reported within {:?}",
                query.query_id, self.config.shutdown_timeout
            );
        }
        self.stream_mgr.remove_query(query.query_id);
        info!(
            "query {} shut down: {}",
            query.query_id,
            control.state.status()
        );
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::function::BuiltinFunctions;
    use crate::planner::{
        BoundExpression, FragmentInstanceParams, OutputPartition, PlanNode, ScanRange,
    };
    use crate::runtime::ExecConfigBuilder;
    use crate::types::LogicalType;
    use crate::util::record_batch_to_string;

    fn config(num_backends: usize, capacity: usize, batch_size: usize) -> ExecConfig {
        ExecConfigBuilder::default()
            .num_backends(num_backends)
            .channel_capacity(capacity)
            .batch_size(batch_size)
            .shutdown_timeout(Duration::from_secs(10))
            .build()
            .unwrap()
    }

    fn scan() -> PlanNode {
        PlanNode::text_scan(&["v"], vec![LogicalType::Bigint], b',')
    }

    fn rows(from: i64, to: i64) -> String {
        (from..to).map(|i| i.to_string()).collect::<Vec<_>>().join("\n")
    }

    /// Remote scans of `ranges` streamed into a coordinator exchange.
    fn distributed_request(ranges: Vec<String>) -> ExecutionRequest {
        let instances = ranges
            .iter()
            .enumerate()
            .map(|(i, data)| {
                FragmentInstanceParams::new(vec![ScanRange::inline(&format!("part{}.csv", i), data)])
            })
            .collect();
        let remote = PlanFragment::remote(
            FragmentId(1),
            scan(),
            FragmentId(0),
            OutputPartition::Unpartitioned,
            instances,
        );
        let root = PlanNode::exchange(FragmentId(1), &["v"], vec![LogicalType::Bigint]);
        let local = PlanFragment::coordinator(FragmentId(0), root, FragmentInstanceParams::default());
        ExecutionRequest::with_select_list(
            vec![local, remote],
            vec![BoundExpression::reference("v", 0, LogicalType::Bigint)],
        )
    }

    fn drain(coordinator: &mut Coordinator) -> Result<Vec<String>, CoordinatorError> {
        let mut lines = vec![];
        while let Some(batch) = coordinator.get_next_batch()? {
            lines.extend(record_batch_to_string(&batch).unwrap().lines().map(String::from));
        }
        Ok(lines)
    }

    #[test]
    fn gathers_all_remote_rows() {
        let mut coordinator = Coordinator::in_process(config(2, 2, 2));
        let request = distributed_request(vec![rows(0, 5), rows(5, 10), rows(10, 12)]);
        coordinator.exec(&request).unwrap();
        let mut lines = drain(&mut coordinator).unwrap();
        lines.sort_by_key(|l| l.parse::<i64>().unwrap());
        assert_eq!(lines, (0..12).map(|i| i.to_string()).collect::<Vec<_>>());
        assert_eq!(coordinator.status(), Some(QueryStatus::Ok));
        assert_eq!(coordinator.num_instances(), 4);
        assert_eq!(coordinator.get_next_batch().unwrap(), None);
        assert_eq!(coordinator.profile().total(crate::runtime::ROWS_READ), 24);
    }

    #[test]
    fn query_without_table_source_yields_one_empty_row() {
        let mut coordinator = Coordinator::in_process(config(0, 2, 2));
        let expr = BoundExpression::function(
            &BuiltinFunctions::new(),
            "add",
            vec![BoundExpression::constant(1), BoundExpression::constant(1)],
        )
        .unwrap();
        let request = ExecutionRequest::with_select_list(vec![], vec![expr]);
        coordinator.exec(&request).unwrap();
        let batch = coordinator.get_next_batch().unwrap().unwrap();
        assert_eq!((batch.num_rows(), batch.num_columns()), (1, 0));
        assert!(coordinator.get_next_batch().unwrap().is_none());
        assert_eq!(coordinator.status(), Some(QueryStatus::Ok));
    }

    #[test]
    fn cancel_stops_every_instance() {
        let mut coordinator = Coordinator::in_process(config(3, 1, 1));
        let request = distributed_request(vec![rows(0, 5000), rows(0, 5000), rows(0, 5000)]);
        coordinator.exec(&request).unwrap();
        assert!(coordinator.get_next_batch().unwrap().is_some());

        coordinator.cancel();
        assert!(matches!(
            coordinator.get_next_batch(),
            Err(CoordinatorError::Cancelled(_))
        ));
        coordinator.shutdown();
        let statuses = coordinator.instance_statuses();
        assert_eq!(statuses.len(), 4);
        assert!(statuses
            .iter()
            .all(|(_, status)| *status == InstanceStatus::Cancelled));
        assert_eq!(coordinator.status(), Some(QueryStatus::Cancelled));
    }

    #[test]
    fn instance_failure_fails_the_query() {
        let mut coordinator = Coordinator::in_process(config(2, 2, 2));
        let mut request = distributed_request(vec![rows(0, 3), rows(3, 6)]);
        request.fragments[1].instances[1] =
            FragmentInstanceParams::new(vec![ScanRange::file("/nonexistent/part.csv")]);
        coordinator.exec(&request).unwrap();
        let err = drain(&mut coordinator).unwrap_err();
        match err {
            CoordinatorError::QueryFailed {
                status: QueryStatus::Failed { message, .. },
                ..
            } => assert!(message.contains("/nonexistent/part.csv"), "{}", message),
            other => panic!("unexpected error {:?}", other),
        }
        // the status is sticky
        assert!(coordinator.get_next_batch().is_err());
    }

    #[test]
    fn only_the_failing_instance_reports_failure() {
        let mut coordinator = Coordinator::in_process(config(3, 1, 1));
        let mut request = distributed_request(vec![rows(0, 5000), rows(0, 5000), rows(0, 1)]);
        request.fragments[1].instances[2] =
            FragmentInstanceParams::new(vec![ScanRange::file("/nonexistent/part.csv")]);
        coordinator.exec(&request).unwrap();
        assert!(drain(&mut coordinator).is_err());
        coordinator.shutdown();

        let statuses = coordinator.instance_statuses();
        assert_eq!(statuses.len(), 4);
        let failed = statuses
            .iter()
            .filter(|(_, status)| matches!(status, InstanceStatus::Failed(_)))
            .map(|(instance, _)| *instance)
            .collect::<Vec<_>>();
        assert_eq!(failed.len(), 1, "{:?}", statuses);
        for (instance, status) in &statuses {
            if *instance != failed[0] {
                assert_eq!(*status, InstanceStatus::Cancelled, "instance {}", instance);
            }
        }
        match coordinator.status() {
            Some(QueryStatus::Failed { instance, .. }) => assert_eq!(instance, Some(failed[0])),
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn limit_over_exchange_stops_senders_cleanly() {
        let mut coordinator = Coordinator::in_process(config(2, 1, 1));
        let mut request = distributed_request(vec![rows(0, 5000), rows(0, 5000)]);
        let exchange = PlanNode::exchange(FragmentId(1), &["v"], vec![LogicalType::Bigint]);
        request.fragments[0] = PlanFragment::coordinator(
            FragmentId(0),
            PlanNode::limit(Some(3), None, exchange),
            FragmentInstanceParams::default(),
        );
        coordinator.exec(&request).unwrap();
        assert_eq!(drain(&mut coordinator).unwrap().len(), 3);
        assert_eq!(coordinator.status(), Some(QueryStatus::Ok));
        coordinator.shutdown();

        let statuses = coordinator.instance_statuses();
        assert_eq!(statuses.len(), 3);
        for (instance, status) in statuses {
            assert_eq!(status, InstanceStatus::Ok, "instance {}", instance);
        }
        assert_eq!(coordinator.status(), Some(QueryStatus::Ok));
    }

    #[test]
    fn row_errors_are_collected_from_instances() {
        let mut coordinator = Coordinator::in_process(config(2, 2, 8));
        let request = distributed_request(vec!["1\nx\n2".to_string(), "3\ny".to_string()]);
        coordinator.exec(&request).unwrap();
        assert_eq!(drain(&mut coordinator).unwrap().len(), 3);
        let files = coordinator.file_errors();
        assert_eq!(files.get("part0.csv"), Some(&1));
        assert_eq!(files.get("part1.csv"), Some(&1));
        assert_eq!(coordinator.num_errors(), 2);
        let log = coordinator.error_log();
        assert_eq!(log.lines().count(), 2);
        assert!(log.starts_with("Error parsing row: file: part0.csv, line: 2"));
    }

    #[test]
    fn invalid_request_starts_nothing() {
        let mut coordinator = Coordinator::in_process(config(0, 2, 2));
        let request = distributed_request(vec![rows(0, 3)]);
        assert!(matches!(
            coordinator.exec(&request),
            Err(CoordinatorError::InvalidRequest(RequestError::NoBackends))
        ));
        assert!(matches!(
            coordinator.get_next_batch(),
            Err(CoordinatorError::NotExecuted)
        ));
    }

    #[test]
    fn shutdown_is_idempotent_and_releases_streams() {
        let stream_mgr = DataStreamMgr::new();
        let config = config(1, 1, 1);
        let backend = InProcessBackend::new(stream_mgr.clone(), config.clone());
        let mut coordinator = Coordinator::new(config, stream_mgr.clone(), backend.clone());
        let request = distributed_request(vec![rows(0, 1000)]);
        coordinator.exec(&request).unwrap();
        assert_eq!(stream_mgr.num_streams(request.query_id()), 1);
        coordinator.shutdown();
        coordinator.shutdown();
        assert_eq!(stream_mgr.num_streams(request.query_id()), 0);
        assert_eq!(backend.num_running(), 0);
        assert_eq!(coordinator.status(), Some(QueryStatus::Cancelled));
    }
}
