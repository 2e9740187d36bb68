use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ahash::RandomState;
use parking_lot::Mutex;

use super::{ExecConfig, MemTracker, RuntimeProfile};
use crate::common::FragmentInstanceId;

pub const ROWS_READ: &str = "RowsRead";
pub const ROWS_RETURNED: &str = "RowsReturned";
pub const BATCHES_SENT: &str = "BatchesSent";
pub const ROW_ERRORS: &str = "RowErrors";
pub const PEAK_MEMORY_USAGE: &str = "PeakMemoryUsage";
pub const TOTAL_TIME_MS: &str = "TotalTimeMs";

/// Terminal state of one fragment instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Ok,
    Cancelled,
    Failed(String),
}

impl InstanceStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, InstanceStatus::Ok)
    }
}

/// Bounded error log that keeps each distinct message once, in arrival order.
#[derive(Debug)]
pub struct ErrorLog {
    max_errors: usize,
    entries: Vec<String>,
    occurrences: HashMap<String, usize, RandomState>,
    suppressed: usize,
}

impl ErrorLog {
    pub fn new(max_errors: usize) -> Self {
        ErrorLog {
            max_errors,
            entries: vec![],
            occurrences: HashMap::default(),
            suppressed: 0,
        }
    }

    pub fn add(&mut self, message: String) {
        if let Some(count) = self.occurrences.get_mut(&message) {
            *count += 1;
            return;
        }
        if self.entries.len() >= self.max_errors {
            self.suppressed += 1;
            return;
        }
        self.occurrences.insert(message.clone(), 1);
        self.entries.push(message);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Every message added, duplicates and suppressed ones included.
    pub fn num_errors(&self) -> usize {
        self.occurrences.values().sum::<usize>() + self.suppressed
    }

    pub fn to_text(&self) -> String {
        let mut lines = self.entries.clone();
        if self.suppressed > 0 {
            lines.push(format!("... {} more errors suppressed", self.suppressed));
        }
        lines.join("\n")
    }
}

/// Per-instance execution state: the error log, per-file error counts,
/// counters, memory tracking and the terminal status.
pub struct ExecutionContext {
    instance_id: FragmentInstanceId,
    config: ExecConfig,
    cancelled: Arc<AtomicBool>,
    error_log: Mutex<ErrorLog>,
    file_errors: Mutex<BTreeMap<String, u64>>,
    mem_tracker: Arc<MemTracker>,
    rows_read: AtomicU64,
    rows_returned: AtomicU64,
    batches_sent: AtomicU64,
    row_errors: AtomicU64,
    start: Instant,
    status: Mutex<Option<InstanceStatus>>,
}

impl ExecutionContext {
    pub fn new(
        instance_id: FragmentInstanceId,
        config: ExecConfig,
        cancelled: Arc<AtomicBool>,
    ) -> Arc<Self> {
        let mem_tracker = MemTracker::new(format!("Instance {}", instance_id), config.mem_limit);
        Arc::new(ExecutionContext {
            instance_id,
            error_log: Mutex::new(ErrorLog::new(config.max_errors)),
            config,
            cancelled,
            file_errors: Mutex::new(BTreeMap::new()),
            mem_tracker,
            rows_read: AtomicU64::new(0),
            rows_returned: AtomicU64::new(0),
            batches_sent: AtomicU64::new(0),
            row_errors: AtomicU64::new(0),
            start: Instant::now(),
            status: Mutex::new(None),
        })
    }

    pub fn instance_id(&self) -> FragmentInstanceId {
        self.instance_id
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn mem_tracker(&self) -> &Arc<MemTracker> {
        &self.mem_tracker
    }

    pub fn log_error(&self, message: String) {
        self.error_log.lock().add(message);
    }

    /// Records a skipped input row of `file_name`.
    pub fn log_row_error(&self, file_name: &str, message: String) {
        self.row_errors.fetch_add(1, Ordering::Relaxed);
        self.log_error(message);
        *self
            .file_errors
            .lock()
            .entry(file_name.to_string())
            .or_default() += 1;
    }

    pub fn error_log(&self) -> String {
        self.error_log.lock().to_text()
    }

    pub fn num_errors(&self) -> usize {
        self.error_log.lock().num_errors()
    }

    pub fn file_errors(&self) -> BTreeMap<String, u64> {
        self.file_errors.lock().clone()
    }

    pub fn add_rows_read(&self, rows: usize) {
        self.rows_read.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn add_rows_returned(&self, rows: usize) {
        self.rows_returned.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn add_batches_sent(&self, batches: usize) {
        self.batches_sent.fetch_add(batches as u64, Ordering::Relaxed);
    }

    /// Records the terminal status; later calls keep the first one.
    pub fn set_status(&self, status: InstanceStatus) {
        self.status.lock().get_or_insert(status);
    }

    pub fn status(&self) -> Option<InstanceStatus> {
        self.status.lock().clone()
    }

    pub fn build_profile(&self) -> RuntimeProfile {
        let mut profile = RuntimeProfile::new(format!("Instance {}", self.instance_id));
        let counters = [
            (ROWS_READ, self.rows_read.load(Ordering::Relaxed)),
            (ROWS_RETURNED, self.rows_returned.load(Ordering::Relaxed)),
            (BATCHES_SENT, self.batches_sent.load(Ordering::Relaxed)),
            (ROW_ERRORS, self.row_errors.load(Ordering::Relaxed)),
            (PEAK_MEMORY_USAGE, self.mem_tracker.peak() as u64),
            (TOTAL_TIME_MS, self.start.elapsed().as_millis() as u64),
        ];
        for (name, value) in counters {
            profile.set_counter(name, value as i64);
        }
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{FragmentId, QueryId};

    #[test]
    fn error_log_dedups_and_bounds() {
        let mut log = ErrorLog::new(2);
        log.add("a".to_string());
        log.add("a".to_string());
        log.add("b".to_string());
        log.add("c".to_string());
        assert_eq!(log.entries(), &["a".to_string(), "b".to_string()]);
        assert_eq!(log.num_errors(), 4);
        assert_eq!(log.to_text(), "a\nb\n... 1 more errors suppressed");
    }

    #[test]
    fn row_errors_count_per_file() {
        let id = FragmentInstanceId::new(QueryId(1), FragmentId(0), 0);
        let ctx = ExecutionContext::new(id, ExecConfig::default(), Arc::new(AtomicBool::new(false)));
        ctx.log_row_error("a.csv", "bad row 1".to_string());
        ctx.log_row_error("a.csv", "bad row 2".to_string());
        ctx.log_row_error("b.csv", "bad row 1".to_string());
        let files = ctx.file_errors();
        assert_eq!(files.get("a.csv"), Some(&2));
        assert_eq!(files.get("b.csv"), Some(&1));
        assert_eq!(ctx.error_log(), "bad row 1\nbad row 2");
        assert_eq!(ctx.build_profile().counter(ROW_ERRORS), Some(3));
    }

    #[test]
    fn first_status_wins() {
        let id = FragmentInstanceId::new(QueryId(1), FragmentId(0), 0);
        let ctx = ExecutionContext::new(id, ExecConfig::default(), Arc::new(AtomicBool::new(false)));
        ctx.set_status(InstanceStatus::Failed("x".to_string()));
        ctx.set_status(InstanceStatus::Ok);
        assert_eq!(ctx.status(), Some(InstanceStatus::Failed("x".to_string())));
    }
}
