use std::collections::{HashMap, HashSet};

use derive_new::new;

use super::{BoundExpression, DataSink, PlanFragment, RequestError};
use crate::common::{FragmentId, QueryId};
use crate::types::LogicalType;
use crate::util::TreeRender;

/// The compiled form of one query, as handed over by the planner.
///
/// `fragments` is empty when the query has no table source: the select list is
/// then evaluated once without an input row.
#[derive(new, Debug, Clone)]
pub struct ExecutionRequest {
    #[new(value = "QueryId::next()")]
    pub(crate) query_id: QueryId,
    pub(crate) fragments: Vec<PlanFragment>,
    pub(crate) select_list: Vec<BoundExpression>,
    pub(crate) output_names: Vec<String>,
    pub(crate) output_types: Vec<LogicalType>,
}

impl ExecutionRequest {
    /// Builds a request whose output columns are named and typed after the select list.
    pub fn with_select_list(fragments: Vec<PlanFragment>, select_list: Vec<BoundExpression>) -> Self {
        let output_names = select_list.iter().map(|e| e.alias()).collect();
        let output_types = select_list.iter().map(|e| e.return_type()).collect();
        ExecutionRequest::new(fragments, select_list, output_names, output_types)
    }

    pub fn query_id(&self) -> QueryId {
        self.query_id
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    pub fn output_types(&self) -> &[LogicalType] {
        &self.output_types
    }

    pub fn select_list(&self) -> &[BoundExpression] {
        &self.select_list
    }

    pub fn has_table_source(&self) -> bool {
        !self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[PlanFragment] {
        &self.fragments
    }

    pub fn fragment(&self, id: FragmentId) -> Option<&PlanFragment> {
        self.fragments.iter().find(|f| f.id == id)
    }

    pub fn coordinator_fragment(&self) -> Option<&PlanFragment> {
        self.fragments.iter().find(|f| f.is_coordinator)
    }

    pub fn remote_fragments(&self) -> impl Iterator<Item = &PlanFragment> {
        self.fragments.iter().filter(|f| !f.is_coordinator)
    }

    pub fn num_remote_instances(&self) -> usize {
        self.remote_fragments().map(|f| f.instances.len()).sum()
    }

    /// Checks the structural rules the coordinator relies on.
    pub fn validate(&self, num_backends: usize) -> Result<(), RequestError> {
        let mut ids = HashSet::new();
        for fragment in &self.fragments {
            if !ids.insert(fragment.id) {
                return Err(RequestError::DuplicateFragment(fragment.id));
            }
        }

        let input_width = if self.has_table_source() {
            let coordinators = self.fragments.iter().filter(|f| f.is_coordinator).count();
            if coordinators != 1 {
                return Err(RequestError::CoordinatorCount(coordinators));
            }
            self.validate_fragments()?;
            if num_backends == 0 && self.remote_fragments().next().is_some() {
                return Err(RequestError::NoBackends);
            }
            self.coordinator_fragment()
                .map(|f| f.root.output_types().len())
                .unwrap_or_default()
        } else {
            0
        };

        self.validate_select_list(input_width)
    }

    fn validate_fragments(&self) -> Result<(), RequestError> {
        // destination fragment -> fragments streaming into it
        let mut producers: HashMap<FragmentId, Vec<FragmentId>> = HashMap::new();
        for fragment in &self.fragments {
            if fragment.instances.is_empty() {
                return Err(RequestError::NoInstances(fragment.id));
            }
            match (&fragment.sink, fragment.is_coordinator) {
                (DataSink::Result, true) => {
                    if fragment.instances.len() != 1 {
                        return Err(RequestError::InvalidCoordinator(fragment.id));
                    }
                }
                (DataSink::Stream { .. }, true) => {
                    return Err(RequestError::InvalidCoordinator(fragment.id))
                }
                (DataSink::Result, false) => {
                    return Err(RequestError::UnexpectedResultSink(fragment.id))
                }
                (DataSink::Stream { dest, .. }, false) => {
                    if *dest == fragment.id {
                        return Err(RequestError::SelfDestination(fragment.id));
                    }
                    if self.fragment(*dest).is_none() {
                        return Err(RequestError::UnknownDestination {
                            fragment: fragment.id,
                            dest: *dest,
                        });
                    }
                    producers.entry(*dest).or_default().push(fragment.id);
                }
            }
        }

        for fragment in &self.fragments {
            let sources = fragment.root.exchange_sources();
            if sources.len() > 1 {
                return Err(RequestError::MultipleExchanges(fragment.id));
            }
            let streamed = producers.get(&fragment.id).cloned().unwrap_or_default();
            if let Some(source) = sources.first() {
                if !streamed.contains(source) {
                    return Err(RequestError::UnconnectedExchange {
                        fragment: fragment.id,
                        source_fragment: *source,
                    });
                }
            }
            if let Some(producer) = streamed.iter().find(|p| !sources.contains(p)) {
                return Err(RequestError::UnconsumedStream {
                    fragment: *producer,
                    dest: fragment.id,
                });
            }
        }
        Ok(())
    }

    fn validate_select_list(&self, input_width: usize) -> Result<(), RequestError> {
        if self.select_list.len() != self.output_types.len() {
            return Err(RequestError::OutputArity {
                exprs: self.select_list.len(),
                types: self.output_types.len(),
            });
        }
        for (index, (expr, expected)) in self
            .select_list
            .iter()
            .zip(self.output_types.iter())
            .enumerate()
        {
            if expr.return_type() != *expected {
                return Err(RequestError::OutputType {
                    index,
                    expected: *expected,
                    actual: expr.return_type(),
                });
            }
            if let Some(column) = expr.max_column_index() {
                if column >= input_width {
                    return Err(RequestError::ColumnOutOfRange {
                        index,
                        column,
                        width: input_width,
                    });
                }
            }
        }
        Ok(())
    }

    /// Textual plan of the request; nothing is executed.
    pub fn explain_string(&self) -> String {
        TreeRender::request_to_string(self)
    }
}
