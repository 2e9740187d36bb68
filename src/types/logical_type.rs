use arrow::datatypes::DataType;
use strum_macros::Display;

use super::TypeError;

/// Column types understood by the execution core.
/// LogicalType -> arrow::datatypes::DataType
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum LogicalType {
    SqlNull,
    Boolean,
    Tinyint,
    Smallint,
    Integer,
    Bigint,
    Float,
    Double,
    Varchar,
}

impl LogicalType {
    pub fn numeric() -> Vec<LogicalType> {
        vec![
            LogicalType::Tinyint,
            LogicalType::Smallint,
            LogicalType::Integer,
            LogicalType::Bigint,
            LogicalType::Float,
            LogicalType::Double,
        ]
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            LogicalType::Tinyint
                | LogicalType::Smallint
                | LogicalType::Integer
                | LogicalType::Bigint
                | LogicalType::Float
                | LogicalType::Double
        )
    }

    pub fn max_logical_type(
        left: &LogicalType,
        right: &LogicalType,
    ) -> Result<LogicalType, TypeError> {
        if left == right {
            return Ok(*left);
        }
        match (left, right) {
            // SqlNull type can be cast to anything
            (LogicalType::SqlNull, _) => return Ok(*right),
            (_, LogicalType::SqlNull) => return Ok(*left),
            _ => {}
        }
        if left.is_numeric() && right.is_numeric() {
            if LogicalType::can_implicit_cast(left, right) {
                return Ok(*right);
            }
            if LogicalType::can_implicit_cast(right, left) {
                return Ok(*left);
            }
        }
        Err(TypeError::InternalError(format!(
            "can not combine two types: {:?} and {:?}",
            left, right
        )))
    }

    pub fn can_implicit_cast(from: &LogicalType, to: &LogicalType) -> bool {
        if from == to {
            return true;
        }
        match from {
            LogicalType::SqlNull => true,
            LogicalType::Boolean => false,
            LogicalType::Tinyint => matches!(
                to,
                LogicalType::Smallint
                    | LogicalType::Integer
                    | LogicalType::Bigint
                    | LogicalType::Float
                    | LogicalType::Double
            ),
            LogicalType::Smallint => matches!(
                to,
                LogicalType::Integer | LogicalType::Bigint | LogicalType::Float | LogicalType::Double
            ),
            LogicalType::Integer => matches!(
                to,
                LogicalType::Bigint | LogicalType::Float | LogicalType::Double
            ),
            LogicalType::Bigint => matches!(to, LogicalType::Float | LogicalType::Double),
            LogicalType::Float => matches!(to, LogicalType::Double),
            LogicalType::Double => false,
            LogicalType::Varchar => false,
        }
    }
}

impl From<LogicalType> for DataType {
    fn from(value: LogicalType) -> Self {
        match value {
            LogicalType::SqlNull => DataType::Null,
            LogicalType::Boolean => DataType::Boolean,
            LogicalType::Tinyint => DataType::Int8,
            LogicalType::Smallint => DataType::Int16,
            LogicalType::Integer => DataType::Int32,
            LogicalType::Bigint => DataType::Int64,
            LogicalType::Float => DataType::Float32,
            LogicalType::Double => DataType::Float64,
            LogicalType::Varchar => DataType::Utf8,
        }
    }
}

impl TryFrom<&DataType> for LogicalType {
    type Error = TypeError;

    fn try_from(value: &DataType) -> Result<Self, Self::Error> {
        Ok(match value {
            DataType::Null => LogicalType::SqlNull,
            DataType::Boolean => LogicalType::Boolean,
            DataType::Int8 => LogicalType::Tinyint,
            DataType::Int16 => LogicalType::Smallint,
            DataType::Int32 => LogicalType::Integer,
            DataType::Int64 => LogicalType::Bigint,
            DataType::Float32 => LogicalType::Float,
            DataType::Float64 => LogicalType::Double,
            DataType::Utf8 => LogicalType::Varchar,
            other => return Err(TypeError::UnsupportedDataType(other.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(LogicalType::Integer, LogicalType::Bigint, LogicalType::Bigint)]
    #[test_case(LogicalType::Double, LogicalType::Tinyint, LogicalType::Double)]
    #[test_case(LogicalType::SqlNull, LogicalType::Varchar, LogicalType::Varchar)]
    #[test_case(LogicalType::Float, LogicalType::Float, LogicalType::Float)]
    fn max_logical_type(left: LogicalType, right: LogicalType, expected: LogicalType) {
        assert_eq!(
            LogicalType::max_logical_type(&left, &right).unwrap(),
            expected
        );
    }

    #[test]
    fn varchar_does_not_combine_with_numbers() {
        assert!(LogicalType::max_logical_type(&LogicalType::Varchar, &LogicalType::Integer).is_err());
    }

    #[test]
    fn arrow_type_round_trip_and_display() {
        let ty: DataType = LogicalType::Smallint.into();
        assert_eq!(ty, DataType::Int16);
        assert_eq!(LogicalType::try_from(&ty).unwrap(), LogicalType::Smallint);
        assert!(LogicalType::try_from(&DataType::Date32).is_err());
        assert_eq!(LogicalType::Varchar.to_string(), "VARCHAR");
    }
}
