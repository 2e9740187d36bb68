use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use derive_new::new;
use parking_lot::{Condvar, Mutex};

use crate::common::{FragmentInstanceId, QueryId};
use crate::runtime::{ExecutionContext, InstanceStatus, RuntimeProfile};

/// Terminal or running state of a whole query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
    Running,
    Ok,
    Cancelled,
    /// The first fatal error seen; `instance` is `None` when the coordinator itself failed.
    Failed {
        instance: Option<FragmentInstanceId>,
        message: String,
    },
}

impl QueryStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueryStatus::Running)
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStatus::Running => write!(f, "RUNNING"),
            QueryStatus::Ok => write!(f, "OK"),
            QueryStatus::Cancelled => write!(f, "CANCELLED"),
            QueryStatus::Failed {
                instance: Some(instance),
                message,
            } => write!(f, "FAILED (instance {}): {}", instance, message),
            QueryStatus::Failed {
                instance: None,
                message,
            } => write!(f, "FAILED (coordinator): {}", message),
        }
    }
}

/// The completion notification of one fragment instance.
#[derive(new, Debug, Clone)]
pub struct InstanceReport {
    pub instance: FragmentInstanceId,
    pub status: InstanceStatus,
    pub profile: RuntimeProfile,
    pub error_log: String,
    pub file_errors: BTreeMap<String, u64>,
    pub num_errors: usize,
}

impl InstanceReport {
    pub fn from_context(context: &ExecutionContext, status: InstanceStatus) -> Self {
        InstanceReport::new(
            context.instance_id(),
            status,
            context.build_profile(),
            context.error_log(),
            context.file_errors(),
            context.num_errors(),
        )
    }

    /// The report of an instance that never got to run.
    pub fn not_started(instance: FragmentInstanceId, status: InstanceStatus) -> Self {
        InstanceReport::new(
            instance,
            status,
            RuntimeProfile::new(format!("Instance {}", instance)),
            String::new(),
            BTreeMap::new(),
            0,
        )
    }
}

struct Inner {
    status: QueryStatus,
    reports: BTreeMap<FragmentInstanceId, InstanceReport>,
}

/// Aggregated state of every instance of one query.
///
/// All updates go through the internal lock; the status only ever moves from
/// `Running` to one terminal value.
pub struct QueryState {
    query_id: QueryId,
    expected_instances: usize,
    cancelled: Arc<AtomicBool>,
    inner: Mutex<Inner>,
    instance_done: Condvar,
}

impl QueryState {
    pub fn new(query_id: QueryId, expected_instances: usize) -> Arc<Self> {
        Arc::new(QueryState {
            query_id,
            expected_instances,
            cancelled: Arc::new(AtomicBool::new(false)),
            inner: Mutex::new(Inner {
                status: QueryStatus::Running,
                reports: BTreeMap::new(),
            }),
            instance_done: Condvar::new(),
        })
    }

    pub fn query_id(&self) -> QueryId {
        self.query_id
    }

    pub fn expected_instances(&self) -> usize {
        self.expected_instances
    }

    /// The flag instances of this query poll for cancellation.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn raise_cancel_flag(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn status(&self) -> QueryStatus {
        self.inner.lock().status.clone()
    }

    /// Moves a running query to `status`. Returns false if a terminal status was already set.
    pub fn set_terminal(&self, status: QueryStatus) -> bool {
        let mut inner = self.inner.lock();
        if inner.status.is_terminal() {
            return false;
        }
        inner.status = status;
        true
    }

    /// Records a report. Returns true if it carries the query's first fatal error.
    pub fn record(&self, report: InstanceReport) -> bool {
        let mut inner = self.inner.lock();
        let escalate = match &report.status {
            InstanceStatus::Failed(message) if !inner.status.is_terminal() => {
                inner.status = QueryStatus::Failed {
                    instance: Some(report.instance),
                    message: message.clone(),
                };
                true
            }
            _ => false,
        };
        inner.reports.insert(report.instance, report);
        self.instance_done.notify_all();
        escalate
    }

    /// Settles a query whose output was fully consumed: `Ok` unless an instance
    /// was cancelled. A terminal status is kept as is.
    pub fn finish(&self) -> QueryStatus {
        let mut inner = self.inner.lock();
        if !inner.status.is_terminal() {
            let cancelled = inner
                .reports
                .values()
                .any(|r| r.status == InstanceStatus::Cancelled);
            inner.status = if cancelled {
                QueryStatus::Cancelled
            } else {
                QueryStatus::Ok
            };
        }
        inner.status.clone()
    }

    /// Blocks until every instance reported or `timeout` passed; returns whether all reported.
    pub fn wait_for_completion(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while inner.reports.len() < self.expected_instances {
            if self
                .instance_done
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                return inner.reports.len() >= self.expected_instances;
            }
        }
        true
    }

    /// Runs `f` over the reports received so far, in instance id order.
    pub fn with_reports<T>(&self, f: impl FnOnce(&mut dyn Iterator<Item = &InstanceReport>) -> T) -> T {
        let inner = self.inner.lock();
        let mut reports = inner.reports.values();
        f(&mut reports)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::common::FragmentId;

    fn report(query: QueryId, seq: u32, status: InstanceStatus) -> InstanceReport {
        InstanceReport::new(
            FragmentInstanceId::new(query, FragmentId(1), seq),
            status,
            RuntimeProfile::new("Instance"),
            String::new(),
            BTreeMap::new(),
            0,
        )
    }

    #[test]
    fn first_fatal_error_wins() {
        let query = QueryId::next();
        let state = QueryState::new(query, 3);
        assert!(state.record(report(query, 0, InstanceStatus::Failed("first".into()))));
        assert!(!state.record(report(query, 1, InstanceStatus::Failed("second".into()))));
        state.record(report(query, 2, InstanceStatus::Ok));
        match state.status() {
            QueryStatus::Failed { message, instance } => {
                assert_eq!(message, "first");
                assert_eq!(instance.map(|i| i.seq), Some(0));
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn cancellation_suppresses_fatal_errors() {
        let query = QueryId::next();
        let state = QueryState::new(query, 1);
        assert!(state.set_terminal(QueryStatus::Cancelled));
        assert!(!state.record(report(query, 0, InstanceStatus::Failed("late".into()))));
        assert_eq!(state.status(), QueryStatus::Cancelled);
    }

    #[test]
    fn finish_after_all_ok_reports() {
        let query = QueryId::next();
        let state = QueryState::new(query, 2);
        let waiter = {
            let state = state.clone();
            thread::spawn(move || state.wait_for_completion(Duration::from_secs(10)))
        };
        state.record(report(query, 0, InstanceStatus::Ok));
        assert_eq!(state.status(), QueryStatus::Running);
        state.record(report(query, 1, InstanceStatus::Ok));
        assert!(waiter.join().unwrap());
        assert_eq!(state.status(), QueryStatus::Running);
        assert_eq!(state.finish(), QueryStatus::Ok);
        assert_eq!(state.with_reports(|reports| reports.count()), 2);
    }

    #[test]
    fn wait_times_out() {
        let state = QueryState::new(QueryId::next(), 1);
        assert!(!state.wait_for_completion(Duration::from_millis(10)));
    }
}
