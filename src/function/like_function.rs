use std::sync::Arc;

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::compute::kernels::comparison::like;
use arrow::compute::kernels::regexp::regexp_is_match_utf8;

use super::{BuiltinFunctions, ScalarFunction};
use crate::function::FunctionError;
use crate::types::LogicalType;

/// Pattern matching predicates: `like(value, pattern)` and
/// `regexp_like(value, pattern [, match_parameter])`.
pub struct LikeFunctions;

fn as_string_array<'a>(array: &'a ArrayRef, name: &str) -> Result<&'a StringArray, FunctionError> {
    array
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| FunctionError::InvalidArgument {
            name: name.to_string(),
            reason: format!("expected VARCHAR argument, got {:?}", array.data_type()),
        })
}

impl LikeFunctions {
    fn like_function(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        let values = as_string_array(&inputs[0], "like")?;
        let patterns = as_string_array(&inputs[1], "like")?;
        Ok(Arc::new(like(values, patterns)?))
    }

    fn regexp_like_function(inputs: &[ArrayRef]) -> Result<ArrayRef, FunctionError> {
        let values = as_string_array(&inputs[0], "regexp_like")?;
        let patterns = as_string_array(&inputs[1], "regexp_like")?;
        Ok(Arc::new(regexp_is_match_utf8(values, patterns, None)?))
    }

    fn regexp_like_with_parameter_function(
        inputs: &[ArrayRef],
    ) -> Result<ArrayRef, FunctionError> {
        let values = as_string_array(&inputs[0], "regexp_like")?;
        let patterns = as_string_array(&inputs[1], "regexp_like")?;
        let parameters = as_string_array(&inputs[2], "regexp_like")?;
        // The match parameter must be constant over the batch.
        let parameter = if parameters.is_empty() || parameters.is_null(0) {
            ""
        } else {
            parameters.value(0)
        };
        let flags = Self::regex_flags(parameter)?;
        let result = match flags {
            Some(flags) => {
                let flags = StringArray::from(vec![flags.as_str(); values.len()]);
                regexp_is_match_utf8(values, patterns, Some(&flags))?
            }
            None => regexp_is_match_utf8(values, patterns, None)?,
        };
        Ok(Arc::new(result))
    }

    /// Translates a match parameter into regex inline flags.
    ///   'c': case sensitive matching (default)
    ///   'i': case insensitive matching
    ///   'm': multi-line mode
    ///   'n': newline is matched by '.'
    /// When 'c' and 'i' conflict, the last one wins.
    fn regex_flags(parameter: &str) -> Result<Option<String>, FunctionError> {
        let mut case_insensitive = false;
        let mut multi_line = false;
        let mut dot_matches_new_line = false;
        for c in parameter.chars() {
            match c {
                'c' => case_insensitive = false,
                'i' => case_insensitive = true,
                'm' => multi_line = true,
                'n' => dot_matches_new_line = true,
                other => {
                    return Err(FunctionError::InvalidArgument {
                        name: "regexp_like".to_string(),
                        reason: format!("illegal match parameter {}", other),
                    })
                }
            }
        }
        let mut flags = String::new();
        if case_insensitive {
            flags.push('i');
        }
        if multi_line {
            flags.push('m');
        }
        if dot_matches_new_line {
            flags.push('s');
        }
        Ok(if flags.is_empty() { None } else { Some(flags) })
    }

    pub fn register_function(set: &mut BuiltinFunctions) {
        let varchar = LogicalType::Varchar;
        set.add_scalar_functions(
            "like",
            vec![ScalarFunction::new(
                "like".to_string(),
                Self::like_function,
                vec![varchar, varchar],
                LogicalType::Boolean,
            )],
        );
        set.add_scalar_functions(
            "regexp_like",
            vec![
                ScalarFunction::new(
                    "regexp_like".to_string(),
                    Self::regexp_like_function,
                    vec![varchar, varchar],
                    LogicalType::Boolean,
                ),
                ScalarFunction::new(
                    "regexp_like".to_string(),
                    Self::regexp_like_with_parameter_function,
                    vec![varchar, varchar, varchar],
                    LogicalType::Boolean,
                ),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::BooleanArray;
    use test_case::test_case;

    use super::*;

    fn strings(values: &[&str]) -> ArrayRef {
        Arc::new(StringArray::from(values.to_vec()))
    }

    fn booleans(array: ArrayRef) -> Vec<Option<bool>> {
        array
            .as_any()
            .downcast_ref::<BooleanArray>()
            .unwrap()
            .iter()
            .collect()
    }

    #[test]
    fn like_matches_wildcards() {
        let inputs = vec![
            strings(&["hello", "world", "help"]),
            strings(&["hel%", "hel%", "h_lp"]),
        ];
        let result = LikeFunctions::like_function(&inputs).unwrap();
        assert_eq!(booleans(result), vec![Some(true), Some(false), Some(true)]);
    }

    #[test]
    fn regexp_like_is_case_sensitive_by_default() {
        let inputs = vec![strings(&["Abc", "abc"]), strings(&["^abc$", "^abc$"])];
        let result = LikeFunctions::regexp_like_function(&inputs).unwrap();
        assert_eq!(booleans(result), vec![Some(false), Some(true)]);
    }

    #[test_case("i", vec![Some(true), Some(true)])]
    #[test_case("ic", vec![Some(false), Some(true)])]
    #[test_case("ci", vec![Some(true), Some(true)])]
    fn regexp_like_match_parameter(parameter: &str, expected: Vec<Option<bool>>) {
        let inputs = vec![
            strings(&["Abc", "abc"]),
            strings(&["^abc$", "^abc$"]),
            strings(&[parameter, parameter]),
        ];
        let result = LikeFunctions::regexp_like_with_parameter_function(&inputs).unwrap();
        assert_eq!(booleans(result), expected);
    }

    #[test]
    fn illegal_match_parameter_is_rejected() {
        let inputs = vec![strings(&["a"]), strings(&["a"]), strings(&["x"])];
        assert!(LikeFunctions::regexp_like_with_parameter_function(&inputs).is_err());
    }
}
