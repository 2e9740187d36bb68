use std::fmt::Write;

use itertools::Itertools;

use crate::planner::{
    BoundExpression, DataSink, ExecutionRequest, PlanFragment, PlanNode, ScanSource,
};
use crate::types::LogicalType;

pub struct TreeRender;

impl TreeRender {
    pub fn bound_expression_to_string(expr: &BoundExpression) -> String {
        match expr {
            BoundExpression::BoundConstantExpression(e) => {
                format!("Constant({})", e.value)
            }
            BoundExpression::BoundReferenceExpression(e) => {
                format!("Reference({}[{}])", e.base.alias, e.index)
            }
            BoundExpression::BoundCastExpression(e) => {
                let name = if e.try_cast { "TryCast" } else { "Cast" };
                format!(
                    "{}({},{})",
                    name,
                    Self::bound_expression_to_string(&e.child),
                    e.base.return_type,
                )
            }
            BoundExpression::BoundFunctionExpression(e) => {
                let args = e
                    .children
                    .iter()
                    .map(Self::bound_expression_to_string)
                    .join(", ");
                format!("{}({})", e.function.name(), args)
            }
        }
    }

    fn columns_to_string(names: &[String], types: &[LogicalType]) -> String {
        names
            .iter()
            .zip(types.iter())
            .map(|(name, ty)| format!("{}({})", name, ty))
            .join(", ")
    }

    fn plan_node_to_string(plan: &PlanNode) -> String {
        match plan {
            PlanNode::TextScan(node) => format!(
                "TextScan: [{}], delimiter[{:?}]",
                Self::columns_to_string(&node.names, &node.types),
                node.delimiter as char
            ),
            PlanNode::Exchange(node) => format!(
                "Exchange: source[{}], [{}]",
                node.source,
                Self::columns_to_string(&node.names, &node.types)
            ),
            PlanNode::Filter(node) => {
                format!(
                    "Filter: {}",
                    Self::bound_expression_to_string(&node.predicate)
                )
            }
            PlanNode::Project(node) => {
                let exprs = node
                    .exprs
                    .iter()
                    .map(Self::bound_expression_to_string)
                    .join(", ");
                format!("Project: {}", exprs)
            }
            PlanNode::Limit(node) => {
                let limit = node
                    .limit
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "None".to_string());
                let offset = node
                    .offset
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "None".to_string());
                format!("Limit: limit[{}], offset[{}]", limit, offset)
            }
        }
    }

    fn plan_tree_internal(plan: &PlanNode, level: usize, explain_result: &mut String) {
        let plan_string = Self::plan_node_to_string(plan);
        // writing into a String never fails
        let _ = writeln!(explain_result, "{}{}", " ".repeat(level * 2), plan_string);
        for child in plan.children() {
            Self::plan_tree_internal(child, level + 1, explain_result);
        }
    }

    pub fn plan_tree(plan: &PlanNode) -> String {
        let mut result = String::new();
        Self::plan_tree_internal(plan, 0, &mut result);
        result.trim_end().to_string()
    }

    fn fragment_header(fragment: &PlanFragment) -> String {
        let sink = match &fragment.sink {
            DataSink::Result => "RESULT".to_string(),
            DataSink::Stream { dest, partition } => format!("STREAM({}, {})", dest, partition),
        };
        let role = if fragment.is_coordinator {
            "coordinator"
        } else {
            "remote"
        };
        let ranges = fragment
            .instances
            .iter()
            .map(|params| {
                params
                    .scan_ranges
                    .iter()
                    .map(|range| match &range.source {
                        ScanSource::File(_) => range.file_name.clone(),
                        ScanSource::Inline(_) => format!("{} (inline)", range.file_name),
                    })
                    .join(" ")
            })
            .filter(|ranges| !ranges.is_empty())
            .join("; ");
        let mut header = format!(
            "Fragment {} [{}, instances={}] sink: {}",
            fragment.id,
            role,
            fragment.instances.len(),
            sink
        );
        if !ranges.is_empty() {
            let _ = write!(header, ", scan ranges: [{}]", ranges);
        }
        header
    }

    /// Explain text of a request: the select list followed by every fragment's tree.
    pub fn request_to_string(request: &ExecutionRequest) -> String {
        let mut result = String::new();
        let select = request
            .select_list
            .iter()
            .map(Self::bound_expression_to_string)
            .join(", ");
        let _ = writeln!(result, "Select: {}", select);
        if !request.has_table_source() {
            let _ = writeln!(result, "  (no table source)");
        }
        for fragment in &request.fragments {
            let _ = writeln!(result, "{}", Self::fragment_header(fragment));
            Self::plan_tree_internal(&fragment.root, 1, &mut result);
        }
        result.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::common::FragmentId;
    use crate::function::BuiltinFunctions;
    use crate::planner::{FragmentInstanceParams, OutputPartition, ScanRange};

    #[test]
    fn explain_distributed_request() {
        let functions = BuiltinFunctions::new();
        let scan = PlanNode::text_scan(
            &["id", "name"],
            vec![LogicalType::Integer, LogicalType::Varchar],
            b',',
        );
        let predicate = BoundExpression::function(
            &functions,
            "gt",
            vec![
                BoundExpression::reference("id", 0, LogicalType::Integer),
                BoundExpression::constant(1),
            ],
        )
        .unwrap();
        let remote = PlanFragment::remote(
            FragmentId(1),
            PlanNode::filter(predicate, scan),
            FragmentId(0),
            OutputPartition::Unpartitioned,
            vec![FragmentInstanceParams::new(vec![ScanRange::inline(
                "t.csv", "1,a",
            )])],
        );
        let coord = PlanFragment::coordinator(
            FragmentId(0),
            PlanNode::limit(
                Some(10),
                None,
                PlanNode::exchange(
                    FragmentId(1),
                    &["id", "name"],
                    vec![LogicalType::Integer, LogicalType::Varchar],
                ),
            ),
            FragmentInstanceParams::default(),
        );
        let request = ExecutionRequest::with_select_list(
            vec![coord, remote],
            vec![BoundExpression::reference("name", 1, LogicalType::Varchar)],
        );

        let expected = "\
Select: Reference(name[1])
Fragment F00 [coordinator, instances=1] sink: RESULT
  Limit: limit[10], offset[None]
    Exchange: source[F01], [id(INTEGER), name(VARCHAR)]
Fragment F01 [remote, instances=1] sink: STREAM(F00, UNPARTITIONED), scan ranges: [t.csv (inline)]
  Filter: gt(Reference(id[0]), Constant(1))
    TextScan: [id(INTEGER), name(VARCHAR)], delimiter[',']";
        assert_eq!(request.explain_string(), expected);
    }

    #[test]
    fn explain_constant_select() {
        let request = ExecutionRequest::with_select_list(
            vec![],
            vec![BoundExpression::constant("x")],
        );
        assert_eq!(
            TreeRender::request_to_string(&request),
            "Select: Constant(x)\n  (no table source)"
        );
    }
}
