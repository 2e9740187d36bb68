use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use derive_new::new;
use itertools::Itertools;
use log::info;

use super::{QueryError, ResultCursor};
use crate::coordinator::{Coordinator, ExecBackend, InProcessBackend};
use crate::execution::ProjectionEvaluator;
use crate::planner::ExecutionRequest;
use crate::runtime::{DataStreamMgr, ExecConfig, RuntimeProfile};
use crate::types::ScalarValue;

/// Summary counters of the current query.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecStats {
    pub num_rows: u64,
    pub num_instances: usize,
    pub num_errors: usize,
}

/// Runs execution requests one at a time and exposes their results.
///
/// Executing a new request shuts down the previous query first.
pub struct QueryExecutor {
    config: ExecConfig,
    stream_mgr: Arc<DataStreamMgr>,
    backend: Arc<dyn ExecBackend>,
    cursor: Option<ResultCursor>,
}

impl QueryExecutor {
    pub fn new(config: ExecConfig) -> Self {
        let stream_mgr = DataStreamMgr::new();
        let backend = InProcessBackend::new(stream_mgr.clone(), config.clone());
        QueryExecutor::with_backend(config, stream_mgr, backend)
    }

    pub fn with_backend(
        config: ExecConfig,
        stream_mgr: Arc<DataStreamMgr>,
        backend: Arc<dyn ExecBackend>,
    ) -> Self {
        QueryExecutor {
            config,
            stream_mgr,
            backend,
            cursor: None,
        }
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Interpret the select list on every batch instead of folding constants first.
    pub fn disable_codegen(&mut self) {
        self.config.codegen_enabled = false;
    }

    pub fn exec(&mut self, request: &ExecutionRequest) -> Result<(), QueryError> {
        self.shutdown();
        self.cursor = None;

        let evaluator = ProjectionEvaluator::prepare(
            request.select_list(),
            request.output_names(),
            request.output_types(),
            self.config.codegen_enabled,
        );
        let mut coordinator = Coordinator::new(
            self.config.clone(),
            self.stream_mgr.clone(),
            self.backend.clone(),
        );
        coordinator.exec(request)?;
        info!(
            "executing query {} (codegen {})",
            request.query_id(),
            if self.config.codegen_enabled { "enabled" } else { "disabled" }
        );
        self.cursor = Some(ResultCursor::new(coordinator, evaluator));
        Ok(())
    }

    pub fn explain(&self, request: &ExecutionRequest) -> Result<String, QueryError> {
        request
            .validate(self.config.num_backends)
            .map_err(|e| QueryError::CoordinatorError(e.into()))?;
        Ok(request.explain_string())
    }

    fn cursor_mut(&mut self) -> Result<&mut ResultCursor, QueryError> {
        self.cursor.as_mut().ok_or(QueryError::NotExecuting)
    }

    pub fn fetch_batch(&mut self) -> Result<Option<RecordBatch>, QueryError> {
        self.cursor_mut()?.fetch_batch()
    }

    pub fn fetch_row_as_text(&mut self) -> Result<Option<String>, QueryError> {
        self.cursor_mut()?.fetch_row_as_text()
    }

    pub fn fetch_row_as_values(&mut self) -> Result<Option<Vec<ScalarValue>>, QueryError> {
        self.cursor_mut()?.fetch_row_as_values()
    }

    /// True when there is no query or its results are exhausted.
    pub fn eos(&self) -> bool {
        self.cursor.as_ref().map_or(true, ResultCursor::eos)
    }

    pub fn error_log(&self) -> String {
        self.cursor
            .as_ref()
            .map(|c| c.coordinator().error_log())
            .unwrap_or_default()
    }

    /// One `file: count` line per input file with skipped rows.
    pub fn file_errors(&self) -> String {
        self.cursor
            .as_ref()
            .map(|c| {
                c.coordinator()
                    .file_errors()
                    .iter()
                    .map(|(file, count)| format!("{}: {}", file, count))
                    .join("\n")
            })
            .unwrap_or_default()
    }

    pub fn profile(&self) -> RuntimeProfile {
        self.cursor
            .as_ref()
            .map(|c| c.coordinator().profile())
            .unwrap_or_else(|| RuntimeProfile::new("Query"))
    }

    pub fn exec_stats(&self) -> ExecStats {
        self.cursor
            .as_ref()
            .map(|c| {
                ExecStats::new(
                    c.num_rows_returned(),
                    c.coordinator().num_instances(),
                    c.coordinator().num_errors(),
                )
            })
            .unwrap_or_default()
    }

    pub fn cancel(&self) {
        if let Some(cursor) = &self.cursor {
            cursor.coordinator().cancel();
        }
    }

    /// Tears the current query down; its logs and profile stay readable.
    pub fn shutdown(&mut self) {
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::common::FragmentId;
    use crate::function::BuiltinFunctions;
    use crate::planner::{BoundExpression, FragmentInstanceParams, PlanFragment, PlanNode, ScanRange};
    use crate::types::LogicalType;

    fn scan_request(data: &str) -> ExecutionRequest {
        let root = PlanNode::text_scan(&["a", "b"], vec![LogicalType::Integer, LogicalType::Varchar], b',');
        let params = FragmentInstanceParams::new(vec![ScanRange::inline("t.csv", data)]);
        ExecutionRequest::with_select_list(
            vec![PlanFragment::coordinator(FragmentId(0), root, params)],
            vec![
                BoundExpression::reference("b", 1, LogicalType::Varchar),
                BoundExpression::reference("a", 0, LogicalType::Integer),
            ],
        )
    }

    #[test]
    fn text_and_value_fetches_share_the_cursor() {
        let mut executor = QueryExecutor::new(ExecConfig::default());
        executor.exec(&scan_request("1,x\n2,\n3,z")).unwrap();
        assert_eq!(executor.fetch_row_as_text().unwrap(), Some("x,1".to_string()));
        assert_eq!(
            executor.fetch_row_as_values().unwrap(),
            Some(vec![ScalarValue::Utf8(None), ScalarValue::Int32(Some(2))])
        );
        assert_eq!(executor.fetch_row_as_text().unwrap(), Some("z,3".to_string()));
        assert_eq!(executor.fetch_row_as_text().unwrap(), None);
        assert!(executor.eos());
        assert_eq!(executor.exec_stats().num_rows, 3);
    }

    #[test]
    fn batch_and_row_fetches_do_not_mix() {
        let mut executor = QueryExecutor::new(ExecConfig::default());
        executor.exec(&scan_request("1,x")).unwrap();
        assert!(executor.fetch_batch().unwrap().is_some());
        assert!(matches!(
            executor.fetch_row_as_text(),
            Err(QueryError::FetchModeMismatch { .. })
        ));
    }

    #[test]
    fn fetch_before_exec_is_an_error() {
        let mut executor = QueryExecutor::new(ExecConfig::default());
        assert!(matches!(
            executor.fetch_batch(),
            Err(QueryError::NotExecuting)
        ));
        assert!(executor.eos());
    }

    #[test]
    fn projection_errors_fail_the_query() {
        let mut executor = QueryExecutor::new(ExecConfig::default());
        let root = PlanNode::text_scan(&["a"], vec![LogicalType::Integer], b',');
        let params = FragmentInstanceParams::new(vec![ScanRange::inline("t.csv", "2147483647")]);
        let overflow = BoundExpression::function(
            &BuiltinFunctions::new(),
            "add",
            vec![
                BoundExpression::reference("a", 0, LogicalType::Integer),
                BoundExpression::constant(1),
            ],
        )
        .unwrap();
        let request = ExecutionRequest::with_select_list(
            vec![PlanFragment::coordinator(FragmentId(0), root, params)],
            vec![overflow],
        );
        executor.exec(&request).unwrap();
        assert!(matches!(
            executor.fetch_row_as_text(),
            Err(QueryError::ExecutorError(_))
        ));
        assert!(matches!(
            executor.fetch_row_as_text(),
            Err(QueryError::CoordinatorError(_))
        ));
    }

    #[test]
    fn file_errors_are_rendered_per_file() {
        let mut executor = QueryExecutor::new(ExecConfig::default());
        executor.exec(&scan_request("1,x\nbad,y\n2")).unwrap();
        while executor.fetch_batch().unwrap().is_some() {}
        assert_eq!(executor.file_errors(), "t.csv: 2");
        assert_eq!(executor.exec_stats(), ExecStats::new(1, 1, 2));
    }
}
