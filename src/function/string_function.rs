use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::compute::kernels::concat_elements::concat_elements_utf8;

use super::{BuiltinFunctions, ScalarFunction};
use crate::function::FunctionError;
use crate::types::LogicalType;

pub struct ConcatFunction;

impl ConcatFunction {
    fn concat(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        let downcast = |array: &ArrayRef| {
            array
                .as_any()
                .downcast_ref::<StringArray>()
                .cloned()
                .ok_or_else(|| {
                    FunctionError::InternalError(format!(
                        "concat expects VARCHAR arguments, got {:?}",
                        array.data_type()
                    ))
                })
        };
        let left = downcast(&inputs[0])?;
        let right = downcast(&inputs[1])?;
        Ok(Arc::new(concat_elements_utf8(&left, &right)?))
    }

    pub fn register_function(set: &mut BuiltinFunctions) {
        let varchar = LogicalType::Varchar;
        set.add_scalar_functions(
            "concat",
            vec![ScalarFunction::new(
                "concat".to_string(),
                Self::concat,
                vec![varchar, varchar],
                varchar,
            )],
        );
    }
}
