//! Unary operator execution

use crate::error::{Result, RuntimeError};
use fluxgate_core::ast::UnaryOperator;
use fluxgate_core::Value;

/// Execute a unary operation
pub(crate) fn execute_unary_op(op: UnaryOperator, value: &Value) -> Result<Value> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOperator::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
        _ => Err(RuntimeError::InvalidOperation(format!(
            "cannot apply {:?} to {}",
            op,
            value.type_name()
        ))),
    }
}
