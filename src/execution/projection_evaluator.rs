use std::sync::Arc;

use arrow::datatypes::{DataType, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use log::debug;

use super::{ExecutorError, ExpressionExecutor};
use crate::planner::{BoundConstantExpression, BoundExpression, BoundExpressionBase};
use crate::types::{LogicalType, ScalarValue};
use crate::util::SchemaUtil;

/// Evaluates the query's select list over the coordinator fragment's output.
///
/// With codegen enabled, sub-expressions that read no input column are evaluated
/// once in [`ProjectionEvaluator::prepare`] and replaced by their value.
pub struct ProjectionEvaluator {
    exprs: Vec<BoundExpression>,
    output_types: Vec<LogicalType>,
    schema: SchemaRef,
}

impl ProjectionEvaluator {
    pub fn prepare(
        select_list: &[BoundExpression],
        output_names: &[String],
        output_types: &[LogicalType],
        codegen_enabled: bool,
    ) -> Self {
        let exprs = if codegen_enabled {
            select_list.iter().map(Self::fold).collect()
        } else {
            select_list.to_vec()
        };
        ProjectionEvaluator {
            exprs,
            output_types: output_types.to_vec(),
            schema: SchemaUtil::new_schema_ref(output_names, output_types),
        }
    }

    /// A batch of one row and no columns, the input of a query without table source.
    pub fn empty_row() -> Result<RecordBatch, ExecutorError> {
        let options = RecordBatchOptions::new().with_row_count(Some(1));
        Ok(RecordBatch::try_new_with_options(
            Arc::new(Schema::empty()),
            vec![],
            &options,
        )?)
    }

    fn fold(expr: &BoundExpression) -> BoundExpression {
        match expr {
            BoundExpression::BoundConstantExpression(_)
            | BoundExpression::BoundReferenceExpression(_) => expr.clone(),
            _ if expr.is_foldable() => match Self::evaluate_constant(expr) {
                Ok(value) => BoundExpression::BoundConstantExpression(
                    BoundConstantExpression::new(Self::base_of(expr), value),
                ),
                Err(e) => {
                    // left unfolded so the error surfaces when a row is evaluated
                    debug!("not folding {}: {}", expr.alias(), e);
                    expr.clone()
                }
            },
            BoundExpression::BoundCastExpression(e) => {
                let mut folded = e.clone();
                folded.child = Box::new(Self::fold(&e.child));
                BoundExpression::BoundCastExpression(folded)
            }
            BoundExpression::BoundFunctionExpression(e) => {
                let mut folded = e.clone();
                folded.children = e.children.iter().map(Self::fold).collect();
                BoundExpression::BoundFunctionExpression(folded)
            }
        }
    }

    fn base_of(expr: &BoundExpression) -> BoundExpressionBase {
        match expr {
            BoundExpression::BoundConstantExpression(e) => e.base.clone(),
            BoundExpression::BoundReferenceExpression(e) => e.base.clone(),
            BoundExpression::BoundCastExpression(e) => e.base.clone(),
            BoundExpression::BoundFunctionExpression(e) => e.base.clone(),
        }
    }

    fn evaluate_constant(expr: &BoundExpression) -> Result<ScalarValue, ExecutorError> {
        let array = ExpressionExecutor::execute_one(expr, &Self::empty_row()?)?;
        Ok(ScalarValue::try_from_array(&array, 0)?)
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Projects every row of `input`; each column must have its declared output type.
    pub fn evaluate(&self, input: &RecordBatch) -> Result<RecordBatch, ExecutorError> {
        let columns = ExpressionExecutor::execute(&self.exprs, input)?;
        for (index, (column, expected)) in columns.iter().zip(self.output_types.iter()).enumerate()
        {
            let expected_type = DataType::from(*expected);
            if column.data_type() != &expected_type {
                return Err(ExecutorError::TypeMismatch {
                    index,
                    expected: *expected,
                    actual: column.data_type().clone(),
                });
            }
        }
        let options = RecordBatchOptions::new().with_row_count(Some(input.num_rows()));
        Ok(RecordBatch::try_new_with_options(
            self.schema.clone(),
            columns,
            &options,
        )?)
    }
}
