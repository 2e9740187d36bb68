use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray};
use arrow::compute::kernels::boolean::{and_kleene, not, or_kleene};
use arrow::datatypes::DataType;

use super::{BuiltinFunctions, ScalarFunction};
use crate::function::FunctionError;
use crate::types::LogicalType;

pub struct ConjunctionFunctions;

fn as_boolean_array<'a>(array: &'a ArrayRef, op: &str) -> Result<&'a BooleanArray, FunctionError> {
    if *array.data_type() != DataType::Boolean {
        return Err(FunctionError::InternalError(format!(
            "Cannot evaluate '{}' with type {:?}, only Boolean supported",
            op,
            array.data_type()
        )));
    }
    array
        .as_any()
        .downcast_ref::<BooleanArray>()
        .ok_or_else(|| FunctionError::InternalError(format!("{} failed to downcast array", op)))
}

impl ConjunctionFunctions {
    fn and_function(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        let left = as_boolean_array(&inputs[0], "and")?;
        let right = as_boolean_array(&inputs[1], "and")?;
        Ok(Arc::new(and_kleene(left, right)?))
    }

    fn or_function(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        let left = as_boolean_array(&inputs[0], "or")?;
        let right = as_boolean_array(&inputs[1], "or")?;
        Ok(Arc::new(or_kleene(left, right)?))
    }

    fn not_function(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        let input = as_boolean_array(&inputs[0], "not")?;
        Ok(Arc::new(not(input)?))
    }

    pub fn register_function(set: &mut BuiltinFunctions) {
        let boolean = LogicalType::Boolean;
        set.add_scalar_functions(
            "and",
            vec![ScalarFunction::new(
                "and".to_string(),
                Self::and_function,
                vec![boolean, boolean],
                boolean,
            )],
        );
        set.add_scalar_functions(
            "or",
            vec![ScalarFunction::new(
                "or".to_string(),
                Self::or_function,
                vec![boolean, boolean],
                boolean,
            )],
        );
        set.add_scalar_functions(
            "not",
            vec![ScalarFunction::new(
                "not".to_string(),
                Self::not_function,
                vec![boolean],
                boolean,
            )],
        );
    }
}
