use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::compute::kernels::cmp::{eq, gt, gt_eq, lt, lt_eq, neq};

use super::{BuiltinFunctions, ScalarFunc, ScalarFunction};
use crate::function::FunctionError;
use crate::types::LogicalType;

pub struct ComparisonFunctions;

macro_rules! comparison_op {
    ($INPUTS:expr, $OP:ident) => {{
        let left = &$INPUTS[0];
        let right = &$INPUTS[1];
        if left.data_type() != right.data_type() {
            return Err(FunctionError::InternalError(format!(
                "Cannot compare {:?} with {:?}, left and right must be the same type",
                left.data_type(),
                right.data_type()
            )));
        }
        Ok(Arc::new($OP(left, right)?))
    }};
}

impl ComparisonFunctions {
    fn eq_function(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        comparison_op!(inputs, eq)
    }

    fn neq_function(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        comparison_op!(inputs, neq)
    }

    fn lt_function(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        comparison_op!(inputs, lt)
    }

    fn lt_eq_function(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        comparison_op!(inputs, lt_eq)
    }

    fn gt_function(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        comparison_op!(inputs, gt)
    }

    fn gt_eq_function(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        comparison_op!(inputs, gt_eq)
    }

    pub fn register_function(set: &mut BuiltinFunctions) {
        let comparisons: [(&str, ScalarFunc); 6] = [
            ("eq", Self::eq_function),
            ("neq", Self::neq_function),
            ("lt", Self::lt_function),
            ("lt_eq", Self::lt_eq_function),
            ("gt", Self::gt_function),
            ("gt_eq", Self::gt_eq_function),
        ];
        let mut comparable = LogicalType::numeric();
        comparable.push(LogicalType::Boolean);
        comparable.push(LogicalType::Varchar);
        for (name, func) in comparisons {
            let functions = comparable
                .iter()
                .map(|ty| {
                    ScalarFunction::new(name.to_string(), func, vec![*ty, *ty], LogicalType::Boolean)
                })
                .collect();
            set.add_scalar_functions(name, functions);
        }
    }
}
