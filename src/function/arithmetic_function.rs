use arrow::array::ArrayRef;
use arrow::compute::kernels::numeric::{add, div, mul, sub};

use super::{BuiltinFunctions, ScalarFunction};
use crate::function::FunctionError;
use crate::types::LogicalType;

/// Invoke a checked numeric kernel on a pair of arrays of the same primitive type.
/// Integer overflow and integer division by zero surface as errors instead of wrapping.
macro_rules! binary_numeric_op {
    ($INPUTS:expr, $OP:ident) => {{
        let left = &$INPUTS[0];
        let right = &$INPUTS[1];
        if left.data_type() != right.data_type() || !left.data_type().is_numeric() {
            return Err(FunctionError::InternalError(format!(
                "Data types {:?} and {:?} not supported for binary operation '{}'",
                left.data_type(),
                right.data_type(),
                stringify!($OP)
            )));
        }
        Ok($OP(left, right)?)
    }};
}

fn numeric_functions(name: &str, function: super::ScalarFunc) -> Vec<ScalarFunction> {
    LogicalType::numeric()
        .iter()
        .map(|ty| ScalarFunction::new(name.to_string(), function, vec![*ty, *ty], *ty))
        .collect()
}

pub struct AddFunction;

impl AddFunction {
    fn add(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        binary_numeric_op!(inputs, add)
    }

    pub fn register_function(set: &mut BuiltinFunctions) {
        set.add_scalar_functions("add", numeric_functions("add", Self::add));
    }
}

pub struct SubtractFunction;

impl SubtractFunction {
    fn subtract(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        binary_numeric_op!(inputs, sub)
    }

    pub fn register_function(set: &mut BuiltinFunctions) {
        set.add_scalar_functions("subtract", numeric_functions("subtract", Self::subtract));
    }
}

pub struct MultiplyFunction;

impl MultiplyFunction {
    fn multiply(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        binary_numeric_op!(inputs, mul)
    }

    pub fn register_function(set: &mut BuiltinFunctions) {
        set.add_scalar_functions("multiply", numeric_functions("multiply", Self::multiply));
    }
}

pub struct DivideFunction;

impl DivideFunction {
    fn divide(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        binary_numeric_op!(inputs, div)
    }

    pub fn register_function(set: &mut BuiltinFunctions) {
        set.add_scalar_functions("divide", numeric_functions("divide", Self::divide));
    }
}
