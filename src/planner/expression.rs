use derive_new::new;

use crate::function::{BuiltinFunctions, FunctionError, ScalarFunction};
use crate::types::{LogicalType, ScalarValue};

#[derive(new, Debug, Clone)]
pub struct BoundExpressionBase {
    /// The alias of the expression, used as the output column name
    pub(crate) alias: String,
    pub(crate) return_type: LogicalType,
}

/// A compiled scalar expression; column references are already resolved to
/// input column indexes.
#[derive(Debug, Clone)]
pub enum BoundExpression {
    BoundConstantExpression(BoundConstantExpression),
    BoundReferenceExpression(BoundReferenceExpression),
    BoundCastExpression(BoundCastExpression),
    BoundFunctionExpression(BoundFunctionExpression),
}

#[derive(new, Debug, Clone)]
pub struct BoundConstantExpression {
    pub(crate) base: BoundExpressionBase,
    pub(crate) value: ScalarValue,
}

/// A reference to a column of the operator's input batch.
#[derive(new, Debug, Clone)]
pub struct BoundReferenceExpression {
    pub(crate) base: BoundExpressionBase,
    pub(crate) index: usize,
}

#[derive(new, Debug, Clone)]
pub struct BoundCastExpression {
    pub(crate) base: BoundExpressionBase,
    pub(crate) child: Box<BoundExpression>,
    /// Whether to use try_cast or not. try_cast converts cast failures into NULLs instead of
    /// throwing an error.
    pub(crate) try_cast: bool,
}

#[derive(new, Debug, Clone)]
pub struct BoundFunctionExpression {
    pub(crate) base: BoundExpressionBase,
    pub(crate) function: ScalarFunction,
    pub(crate) children: Vec<BoundExpression>,
}

impl BoundExpression {
    pub fn constant(value: impl Into<ScalarValue>) -> Self {
        let value = value.into();
        let base = BoundExpressionBase::new(value.to_string(), value.logical_type());
        BoundExpression::BoundConstantExpression(BoundConstantExpression::new(base, value))
    }

    pub fn reference(alias: &str, index: usize, return_type: LogicalType) -> Self {
        let base = BoundExpressionBase::new(alias.to_string(), return_type);
        BoundExpression::BoundReferenceExpression(BoundReferenceExpression::new(base, index))
    }

    pub fn cast(child: BoundExpression, return_type: LogicalType, try_cast: bool) -> Self {
        let alias = format!("cast({} as {})", child.alias(), return_type);
        let base = BoundExpressionBase::new(alias, return_type);
        BoundExpression::BoundCastExpression(BoundCastExpression::new(
            base,
            Box::new(child),
            try_cast,
        ))
    }

    /// Binds `name` against the function library using the children's return types.
    pub fn function(
        functions: &BuiltinFunctions,
        name: &str,
        children: Vec<BoundExpression>,
    ) -> Result<Self, FunctionError> {
        let arguments = children.iter().map(|c| c.return_type()).collect::<Vec<_>>();
        let function = functions.resolve(name, &arguments)?;
        let alias = format!(
            "{}({})",
            name,
            children
                .iter()
                .map(|c| c.alias())
                .collect::<Vec<_>>()
                .join(", ")
        );
        let base = BoundExpressionBase::new(alias, function.return_type());
        Ok(BoundExpression::BoundFunctionExpression(
            BoundFunctionExpression::new(base, function, children),
        ))
    }

    pub fn return_type(&self) -> LogicalType {
        match self {
            BoundExpression::BoundConstantExpression(expr) => expr.base.return_type,
            BoundExpression::BoundReferenceExpression(expr) => expr.base.return_type,
            BoundExpression::BoundCastExpression(expr) => expr.base.return_type,
            BoundExpression::BoundFunctionExpression(expr) => expr.base.return_type,
        }
    }

    pub fn alias(&self) -> String {
        match self {
            BoundExpression::BoundConstantExpression(expr) => expr.base.alias.clone(),
            BoundExpression::BoundReferenceExpression(expr) => expr.base.alias.clone(),
            BoundExpression::BoundCastExpression(expr) => expr.base.alias.clone(),
            BoundExpression::BoundFunctionExpression(expr) => expr.base.alias.clone(),
        }
    }

    /// True when the expression does not read any input column.
    pub fn is_foldable(&self) -> bool {
        match self {
            BoundExpression::BoundConstantExpression(_) => true,
            BoundExpression::BoundReferenceExpression(_) => false,
            BoundExpression::BoundCastExpression(e) => e.child.is_foldable(),
            BoundExpression::BoundFunctionExpression(e) => {
                e.children.iter().all(|c| c.is_foldable())
            }
        }
    }

    /// The highest input column index referenced by the expression, if any.
    pub fn max_column_index(&self) -> Option<usize> {
        match self {
            BoundExpression::BoundConstantExpression(_) => None,
            BoundExpression::BoundReferenceExpression(e) => Some(e.index),
            BoundExpression::BoundCastExpression(e) => e.child.max_column_index(),
            BoundExpression::BoundFunctionExpression(e) => e
                .children
                .iter()
                .filter_map(|c| c.max_column_index())
                .max(),
        }
    }
}
