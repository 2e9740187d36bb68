mod arithmetic_function;
mod comparison_function;
mod conjunction_function;
mod errors;
mod like_function;
mod scalar_function;
mod string_function;

use std::collections::HashMap;

pub use arithmetic_function::*;
pub use comparison_function::*;
pub use conjunction_function::*;
pub use errors::*;
use itertools::Itertools;
pub use like_function::*;
pub use scalar_function::*;
pub use string_function::*;

use crate::types::LogicalType;

/// The scalar function library available to compiled expressions, keyed by
/// function name; overloads are told apart by their argument types.
#[derive(Default, Clone)]
pub struct BuiltinFunctions {
    functions: HashMap<String, Vec<ScalarFunction>>,
}

impl BuiltinFunctions {
    pub fn new() -> Self {
        let mut set = Self::default();
        set.initialize();
        set
    }

    pub fn add_scalar_functions(&mut self, name: &str, functions: Vec<ScalarFunction>) {
        self.functions
            .entry(name.to_string())
            .or_default()
            .extend(functions);
    }

    fn initialize(&mut self) {
        AddFunction::register_function(self);
        SubtractFunction::register_function(self);
        MultiplyFunction::register_function(self);
        DivideFunction::register_function(self);
        ComparisonFunctions::register_function(self);
        ConjunctionFunctions::register_function(self);
        LikeFunctions::register_function(self);
        ConcatFunction::register_function(self);
    }

    /// Finds the overload of `name` whose argument types match `arguments` exactly.
    pub fn resolve(
        &self,
        name: &str,
        arguments: &[LogicalType],
    ) -> Result<ScalarFunction, FunctionError> {
        self.functions
            .get(name)
            .and_then(|overloads| overloads.iter().find(|f| f.arguments == arguments))
            .cloned()
            .ok_or_else(|| FunctionError::NotFound {
                name: name.to_string(),
                arguments: arguments.iter().join(", "),
            })
    }
}
