use arrow::array::ArrayRef;
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

use super::ExecutorError;
use crate::planner::BoundExpression;

/// ExpressionExecutor is responsible for executing a set of expressions against
/// a row batch and producing one column per expression
pub struct ExpressionExecutor;

impl ExpressionExecutor {
    pub fn execute(
        expressions: &[BoundExpression],
        input: &RecordBatch,
    ) -> Result<Vec<ArrayRef>, ExecutorError> {
        let mut result = vec![];
        for expr in expressions.iter() {
            result.push(Self::execute_internal(expr, input)?);
        }
        Ok(result)
    }

    pub fn execute_one(
        expr: &BoundExpression,
        input: &RecordBatch,
    ) -> Result<ArrayRef, ExecutorError> {
        Self::execute_internal(expr, input)
    }

    fn execute_internal(
        expr: &BoundExpression,
        input: &RecordBatch,
    ) -> Result<ArrayRef, ExecutorError> {
        let array = match expr {
            BoundExpression::BoundConstantExpression(e) => {
                e.value.to_array_of_size(input.num_rows())
            }
            BoundExpression::BoundReferenceExpression(e) => {
                if e.index >= input.num_columns() {
                    return Err(ExecutorError::InternalError(format!(
                        "column reference {} out of range, input has {} columns",
                        e.index,
                        input.num_columns()
                    )));
                }
                input.column(e.index).clone()
            }
            BoundExpression::BoundCastExpression(e) => {
                let child_result = Self::execute_internal(&e.child, input)?;
                let to_type = DataType::from(e.base.return_type);
                let options = CastOptions {
                    safe: e.try_cast,
                    ..Default::default()
                };
                cast_with_options(&child_result, &to_type, &options)?
            }
            BoundExpression::BoundFunctionExpression(e) => {
                let children_result = e
                    .children
                    .iter()
                    .map(|c| Self::execute_internal(c, input))
                    .collect::<Result<Vec<_>, _>>()?;
                e.function.invoke(&children_result)?
            }
        };
        if array.len() != input.num_rows() {
            return Err(ExecutorError::InternalError(format!(
                "expression {} produced {} rows for an input of {}",
                expr.alias(),
                array.len(),
                input.num_rows()
            )));
        }
        Ok(array)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Array, Int32Array, StringArray};
    use arrow::datatypes::{Field, Schema};

    use super::*;
    use crate::function::BuiltinFunctions;
    use crate::types::{LogicalType, ScalarValue};

    fn input() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int32, true),
            Field::new("b", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec!["x", "y", "z"])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn constants_expand_to_batch_length() {
        let functions = BuiltinFunctions::new();
        let expr = BoundExpression::function(
            &functions,
            "add",
            vec![
                BoundExpression::reference("a", 0, LogicalType::Integer),
                BoundExpression::constant(10),
            ],
        )
        .unwrap();
        let result = ExpressionExecutor::execute(&[expr], &input()).unwrap();
        let values = result[0].as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(values.values().to_vec(), vec![11, 12, 13]);
    }

    #[test]
    fn cast_and_try_cast() {
        let strict = BoundExpression::cast(
            BoundExpression::reference("b", 1, LogicalType::Varchar),
            LogicalType::Integer,
            false,
        );
        assert!(ExpressionExecutor::execute_one(&strict, &input()).is_err());

        let lenient = BoundExpression::cast(
            BoundExpression::reference("b", 1, LogicalType::Varchar),
            LogicalType::Integer,
            true,
        );
        let result = ExpressionExecutor::execute_one(&lenient, &input()).unwrap();
        assert_eq!(result.null_count(), 3);
        assert_eq!(
            ScalarValue::try_from_array(&result, 0).unwrap(),
            ScalarValue::Int32(None)
        );
    }

    #[test]
    fn reference_out_of_range_is_an_error() {
        let expr = BoundExpression::reference("c", 5, LogicalType::Integer);
        assert!(matches!(
            ExpressionExecutor::execute_one(&expr, &input()),
            Err(ExecutorError::InternalError(_))
        ));
    }
}
