use arrow::datatypes::SchemaRef;
use derive_new::new;

use super::BoundExpression;
use crate::common::FragmentId;
use crate::types::LogicalType;
use crate::util::SchemaUtil;

/// Reads the delimited text of the instance's scan ranges.
#[derive(new, Debug, Clone)]
pub struct TextScanNode {
    pub(crate) names: Vec<String>,
    pub(crate) types: Vec<LogicalType>,
    pub(crate) delimiter: u8,
}

/// Receives the row batches streamed by every instance of `source`.
#[derive(new, Debug, Clone)]
pub struct ExchangeNode {
    pub(crate) source: FragmentId,
    pub(crate) names: Vec<String>,
    pub(crate) types: Vec<LogicalType>,
}

#[derive(new, Debug, Clone)]
pub struct FilterNode {
    pub(crate) predicate: BoundExpression,
    pub(crate) child: Box<PlanNode>,
}

#[derive(new, Debug, Clone)]
pub struct ProjectNode {
    pub(crate) exprs: Vec<BoundExpression>,
    pub(crate) child: Box<PlanNode>,
}

#[derive(new, Debug, Clone)]
pub struct LimitNode {
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) child: Box<PlanNode>,
}

/// An operator of a fragment's physical plan tree.
#[derive(Debug, Clone)]
pub enum PlanNode {
    TextScan(TextScanNode),
    Exchange(ExchangeNode),
    Filter(FilterNode),
    Project(ProjectNode),
    Limit(LimitNode),
}

impl PlanNode {
    pub fn text_scan(names: &[&str], types: Vec<LogicalType>, delimiter: u8) -> Self {
        let names = names.iter().map(|n| n.to_string()).collect();
        PlanNode::TextScan(TextScanNode::new(names, types, delimiter))
    }

    pub fn exchange(source: FragmentId, names: &[&str], types: Vec<LogicalType>) -> Self {
        let names = names.iter().map(|n| n.to_string()).collect();
        PlanNode::Exchange(ExchangeNode::new(source, names, types))
    }

    pub fn filter(predicate: BoundExpression, child: PlanNode) -> Self {
        PlanNode::Filter(FilterNode::new(predicate, Box::new(child)))
    }

    pub fn project(exprs: Vec<BoundExpression>, child: PlanNode) -> Self {
        PlanNode::Project(ProjectNode::new(exprs, Box::new(child)))
    }

    pub fn limit(limit: Option<u64>, offset: Option<u64>, child: PlanNode) -> Self {
        PlanNode::Limit(LimitNode::new(limit, offset, Box::new(child)))
    }

    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::TextScan(_) | PlanNode::Exchange(_) => vec![],
            PlanNode::Filter(node) => vec![node.child.as_ref()],
            PlanNode::Project(node) => vec![node.child.as_ref()],
            PlanNode::Limit(node) => vec![node.child.as_ref()],
        }
    }

    pub fn output_types(&self) -> Vec<LogicalType> {
        match self {
            PlanNode::TextScan(node) => node.types.clone(),
            PlanNode::Exchange(node) => node.types.clone(),
            PlanNode::Filter(node) => node.child.output_types(),
            PlanNode::Project(node) => node.exprs.iter().map(|e| e.return_type()).collect(),
            PlanNode::Limit(node) => node.child.output_types(),
        }
    }

    pub fn output_names(&self) -> Vec<String> {
        match self {
            PlanNode::TextScan(node) => node.names.clone(),
            PlanNode::Exchange(node) => node.names.clone(),
            PlanNode::Filter(node) => node.child.output_names(),
            PlanNode::Project(node) => node.exprs.iter().map(|e| e.alias()).collect(),
            PlanNode::Limit(node) => node.child.output_names(),
        }
    }

    pub fn schema(&self) -> SchemaRef {
        SchemaUtil::new_schema_ref(&self.output_names(), &self.output_types())
    }

    /// The source fragments of every exchange in this tree.
    pub fn exchange_sources(&self) -> Vec<FragmentId> {
        let mut sources = vec![];
        if let PlanNode::Exchange(node) = self {
            sources.push(node.source);
        }
        for child in self.children() {
            sources.extend(child.exchange_sources());
        }
        sources
    }

    pub fn has_scan(&self) -> bool {
        matches!(self, PlanNode::TextScan(_)) || self.children().iter().any(|c| c.has_scan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_schema_follows_projection() {
        let scan = PlanNode::text_scan(
            &["id", "name"],
            vec![LogicalType::Integer, LogicalType::Varchar],
            b',',
        );
        let plan = PlanNode::limit(
            Some(10),
            None,
            PlanNode::project(
                vec![BoundExpression::reference("name", 1, LogicalType::Varchar)],
                scan,
            ),
        );
        assert_eq!(plan.output_types(), vec![LogicalType::Varchar]);
        assert_eq!(plan.output_names(), vec!["name".to_string()]);
        assert_eq!(plan.schema().fields().len(), 1);
        assert!(plan.has_scan());
        assert!(plan.exchange_sources().is_empty());
    }

    #[test]
    fn exchange_sources_are_collected() {
        let plan = PlanNode::limit(
            Some(1),
            None,
            PlanNode::exchange(FragmentId(4), &["x"], vec![LogicalType::Bigint]),
        );
        assert_eq!(plan.exchange_sources(), vec![FragmentId(4)]);
        assert!(!plan.has_scan());
    }
}
