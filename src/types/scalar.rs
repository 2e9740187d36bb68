use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{
    new_null_array, Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int16Array,
    Int32Array, Int64Array, Int8Array, StringArray,
};
use arrow::datatypes::DataType;

use super::{LogicalType, TypeError};

/// Represents a dynamically typed, nullable single value.
/// This is the single-valued counter-part of arrow’s `Array`.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    /// represents `DataType::Null` (castable to/from any other type)
    Null,
    /// true or false value
    Boolean(Option<bool>),
    /// signed 8bit int
    Int8(Option<i8>),
    /// signed 16bit int
    Int16(Option<i16>),
    /// signed 32bit int
    Int32(Option<i32>),
    /// signed 64bit int
    Int64(Option<i64>),
    /// 32bit float
    Float32(Option<f32>),
    /// 64bit float
    Float64(Option<f64>),
    /// utf-8 encoded string.
    Utf8(Option<String>),
}

macro_rules! impl_scalar {
    ($ty:ty, $scalar:tt) => {
        impl From<$ty> for ScalarValue {
            fn from(value: $ty) -> Self {
                ScalarValue::$scalar(Some(value))
            }
        }

        impl From<Option<$ty>> for ScalarValue {
            fn from(value: Option<$ty>) -> Self {
                ScalarValue::$scalar(value)
            }
        }
    };
}

impl_scalar!(bool, Boolean);
impl_scalar!(i8, Int8);
impl_scalar!(i16, Int16);
impl_scalar!(i32, Int32);
impl_scalar!(i64, Int64);
impl_scalar!(f32, Float32);
impl_scalar!(f64, Float64);
impl_scalar!(String, Utf8);

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(Some(value.to_string()))
    }
}

macro_rules! repeat_array {
    ($VALUE:expr, $ARRAY:ident, $DT:expr, $SIZE:expr) => {{
        match $VALUE {
            Some(v) => Arc::new($ARRAY::from(vec![*v; $SIZE])) as ArrayRef,
            None => new_null_array(&$DT, $SIZE),
        }
    }};
}

macro_rules! typed_value {
    ($ARRAY:expr, $ROW:expr, $ARRAY_TY:ident, $SCALAR:ident) => {{
        let array = $ARRAY
            .as_any()
            .downcast_ref::<$ARRAY_TY>()
            .ok_or_else(|| {
                TypeError::InternalError(format!(
                    "failed to downcast {:?} array to {}",
                    $ARRAY.data_type(),
                    stringify!($ARRAY_TY)
                ))
            })?;
        ScalarValue::$SCALAR(Some(array.value($ROW).into()))
    }};
}

macro_rules! build_array {
    ($VALUES:expr, $ARRAY:ident, $SCALAR:ident) => {{
        let values = $VALUES
            .into_iter()
            .map(|v| match v {
                ScalarValue::$SCALAR(v) => Ok(v),
                ScalarValue::Null => Ok(None),
                other => Err(TypeError::InternalError(format!(
                    "expected {} value, got {:?}",
                    stringify!($SCALAR),
                    other
                ))),
            })
            .collect::<Result<Vec<_>, TypeError>>()?;
        Arc::new($ARRAY::from(values)) as ArrayRef
    }};
}

fn parse_value<T>(value: &str, target: LogicalType) -> Result<T, TypeError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| TypeError::Conversion {
            value: value.to_string(),
            target: target.to_string(),
            reason: e.to_string(),
        })
}

impl ScalarValue {
    /// The NULL value of type `ty`.
    pub fn null_of(ty: LogicalType) -> Self {
        match ty {
            LogicalType::SqlNull => ScalarValue::Null,
            LogicalType::Boolean => ScalarValue::Boolean(None),
            LogicalType::Tinyint => ScalarValue::Int8(None),
            LogicalType::Smallint => ScalarValue::Int16(None),
            LogicalType::Integer => ScalarValue::Int32(None),
            LogicalType::Bigint => ScalarValue::Int64(None),
            LogicalType::Float => ScalarValue::Float32(None),
            LogicalType::Double => ScalarValue::Float64(None),
            LogicalType::Varchar => ScalarValue::Utf8(None),
        }
    }

    /// Parses a text field into a value of type `ty`; an empty field is NULL.
    pub fn try_from_str(value: &str, ty: LogicalType) -> Result<Self, TypeError> {
        if value.is_empty() {
            return Ok(Self::null_of(ty));
        }
        Ok(match ty {
            LogicalType::SqlNull => ScalarValue::Null,
            LogicalType::Boolean => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => ScalarValue::Boolean(Some(true)),
                "false" | "f" | "0" => ScalarValue::Boolean(Some(false)),
                _ => {
                    return Err(TypeError::Conversion {
                        value: value.to_string(),
                        target: ty.to_string(),
                        reason: "invalid boolean literal".to_string(),
                    })
                }
            },
            LogicalType::Tinyint => ScalarValue::Int8(Some(parse_value(value, ty)?)),
            LogicalType::Smallint => ScalarValue::Int16(Some(parse_value(value, ty)?)),
            LogicalType::Integer => ScalarValue::Int32(Some(parse_value(value, ty)?)),
            LogicalType::Bigint => ScalarValue::Int64(Some(parse_value(value, ty)?)),
            LogicalType::Float => ScalarValue::Float32(Some(parse_value(value, ty)?)),
            LogicalType::Double => ScalarValue::Float64(Some(parse_value(value, ty)?)),
            LogicalType::Varchar => ScalarValue::Utf8(Some(value.to_string())),
        })
    }

    /// Builds an array of type `ty` from `values`.
    pub fn iter_to_array(
        values: impl IntoIterator<Item = ScalarValue>,
        ty: LogicalType,
    ) -> Result<ArrayRef, TypeError> {
        Ok(match ty {
            LogicalType::SqlNull => new_null_array(&DataType::Null, values.into_iter().count()),
            LogicalType::Boolean => build_array!(values, BooleanArray, Boolean),
            LogicalType::Tinyint => build_array!(values, Int8Array, Int8),
            LogicalType::Smallint => build_array!(values, Int16Array, Int16),
            LogicalType::Integer => build_array!(values, Int32Array, Int32),
            LogicalType::Bigint => build_array!(values, Int64Array, Int64),
            LogicalType::Float => build_array!(values, Float32Array, Float32),
            LogicalType::Double => build_array!(values, Float64Array, Float64),
            LogicalType::Varchar => build_array!(values, StringArray, Utf8),
        })
    }

    pub fn logical_type(&self) -> LogicalType {
        match self {
            ScalarValue::Null => LogicalType::SqlNull,
            ScalarValue::Boolean(_) => LogicalType::Boolean,
            ScalarValue::Int8(_) => LogicalType::Tinyint,
            ScalarValue::Int16(_) => LogicalType::Smallint,
            ScalarValue::Int32(_) => LogicalType::Integer,
            ScalarValue::Int64(_) => LogicalType::Bigint,
            ScalarValue::Float32(_) => LogicalType::Float,
            ScalarValue::Float64(_) => LogicalType::Double,
            ScalarValue::Utf8(_) => LogicalType::Varchar,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            ScalarValue::Null => true,
            ScalarValue::Boolean(v) => v.is_none(),
            ScalarValue::Int8(v) => v.is_none(),
            ScalarValue::Int16(v) => v.is_none(),
            ScalarValue::Int32(v) => v.is_none(),
            ScalarValue::Int64(v) => v.is_none(),
            ScalarValue::Float32(v) => v.is_none(),
            ScalarValue::Float64(v) => v.is_none(),
            ScalarValue::Utf8(v) => v.is_none(),
        }
    }

    /// Converts the value into an array holding `size` copies of it.
    pub fn to_array_of_size(&self, size: usize) -> ArrayRef {
        match self {
            ScalarValue::Null => new_null_array(&DataType::Null, size),
            ScalarValue::Boolean(v) => repeat_array!(v, BooleanArray, DataType::Boolean, size),
            ScalarValue::Int8(v) => repeat_array!(v, Int8Array, DataType::Int8, size),
            ScalarValue::Int16(v) => repeat_array!(v, Int16Array, DataType::Int16, size),
            ScalarValue::Int32(v) => repeat_array!(v, Int32Array, DataType::Int32, size),
            ScalarValue::Int64(v) => repeat_array!(v, Int64Array, DataType::Int64, size),
            ScalarValue::Float32(v) => repeat_array!(v, Float32Array, DataType::Float32, size),
            ScalarValue::Float64(v) => repeat_array!(v, Float64Array, DataType::Float64, size),
            ScalarValue::Utf8(v) => match v {
                Some(v) => Arc::new(StringArray::from(vec![v.as_str(); size])),
                None => new_null_array(&DataType::Utf8, size),
            },
        }
    }

    /// Extracts the value at `row` of `array`.
    pub fn try_from_array(array: &ArrayRef, row: usize) -> Result<Self, TypeError> {
        if array.is_null(row) {
            return Ok(match array.data_type() {
                DataType::Null => ScalarValue::Null,
                DataType::Boolean => ScalarValue::Boolean(None),
                DataType::Int8 => ScalarValue::Int8(None),
                DataType::Int16 => ScalarValue::Int16(None),
                DataType::Int32 => ScalarValue::Int32(None),
                DataType::Int64 => ScalarValue::Int64(None),
                DataType::Float32 => ScalarValue::Float32(None),
                DataType::Float64 => ScalarValue::Float64(None),
                DataType::Utf8 => ScalarValue::Utf8(None),
                other => return Err(TypeError::UnsupportedDataType(other.clone())),
            });
        }
        Ok(match array.data_type() {
            DataType::Boolean => typed_value!(array, row, BooleanArray, Boolean),
            DataType::Int8 => typed_value!(array, row, Int8Array, Int8),
            DataType::Int16 => typed_value!(array, row, Int16Array, Int16),
            DataType::Int32 => typed_value!(array, row, Int32Array, Int32),
            DataType::Int64 => typed_value!(array, row, Int64Array, Int64),
            DataType::Float32 => typed_value!(array, row, Float32Array, Float32),
            DataType::Float64 => typed_value!(array, row, Float64Array, Float64),
            DataType::Utf8 => typed_value!(array, row, StringArray, Utf8),
            other => return Err(TypeError::UnsupportedDataType(other.clone())),
        })
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn fmt_opt<T: fmt::Display>(f: &mut fmt::Formatter<'_>, v: &Option<T>) -> fmt::Result {
            match v {
                Some(v) => write!(f, "{}", v),
                None => write!(f, "NULL"),
            }
        }
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Boolean(v) => fmt_opt(f, v),
            ScalarValue::Int8(v) => fmt_opt(f, v),
            ScalarValue::Int16(v) => fmt_opt(f, v),
            ScalarValue::Int32(v) => fmt_opt(f, v),
            ScalarValue::Int64(v) => fmt_opt(f, v),
            ScalarValue::Float32(v) => fmt_opt(f, v),
            ScalarValue::Float64(v) => fmt_opt(f, v),
            ScalarValue::Utf8(v) => fmt_opt(f, v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_array_repeats_value() {
        let array = ScalarValue::from(7_i64).to_array_of_size(3);
        assert_eq!(array.len(), 3);
        for row in 0..3 {
            assert_eq!(
                ScalarValue::try_from_array(&array, row).unwrap(),
                ScalarValue::Int64(Some(7))
            );
        }
    }

    #[test]
    fn null_values_keep_their_type() {
        let array = ScalarValue::Utf8(None).to_array_of_size(2);
        assert_eq!(array.data_type(), &DataType::Utf8);
        assert_eq!(array.null_count(), 2);
        let value = ScalarValue::try_from_array(&array, 1).unwrap();
        assert_eq!(value, ScalarValue::Utf8(None));
        assert!(value.is_null());
        assert_eq!(value.to_string(), "NULL");
    }

    #[test]
    fn parse_text_fields() {
        assert_eq!(
            ScalarValue::try_from_str(" 42", LogicalType::Integer).unwrap(),
            ScalarValue::Int32(Some(42))
        );
        assert_eq!(
            ScalarValue::try_from_str("", LogicalType::Double).unwrap(),
            ScalarValue::Float64(None)
        );
        assert_eq!(
            ScalarValue::try_from_str("T", LogicalType::Boolean).unwrap(),
            ScalarValue::Boolean(Some(true))
        );
        let err = ScalarValue::try_from_str("abc", LogicalType::Bigint).unwrap_err();
        assert_eq!(
            err.to_string(),
            "can not convert 'abc' to BIGINT: invalid digit found in string"
        );
        assert!(ScalarValue::try_from_str("300", LogicalType::Tinyint).is_err());
    }

    #[test]
    fn build_array_from_values() {
        let array = ScalarValue::iter_to_array(
            vec![ScalarValue::from(1_i32), ScalarValue::Int32(None)],
            LogicalType::Integer,
        )
        .unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array.null_count(), 1);
        assert!(ScalarValue::iter_to_array(vec![ScalarValue::from("x")], LogicalType::Integer)
            .is_err());
    }

    #[test]
    fn string_values_are_extracted() {
        let array: ArrayRef = Arc::new(StringArray::from(vec!["a", "bc"]));
        assert_eq!(
            ScalarValue::try_from_array(&array, 1).unwrap(),
            ScalarValue::from("bc")
        );
        assert_eq!(ScalarValue::from("bc").logical_type(), LogicalType::Varchar);
    }
}
