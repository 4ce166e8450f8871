//! Comparison operator execution

use crate::error::{Result, RuntimeError};
use fluxgate_core::ast::Operator;
use fluxgate_core::Value;
use std::cmp::Ordering;

/// Execute a comparison operation. Equality works across all types;
/// ordering requires two numbers or two strings.
pub(super) fn execute_comparison(left: &Value, op: &Operator, right: &Value) -> Result<Value> {
    match op {
        Operator::Eq => return Ok(Value::Bool(left == right)),
        Operator::Ne => return Ok(Value::Bool(left != right)),
        _ => {}
    }

    let ordering = match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.partial_cmp(r),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    };

    let Some(ordering) = ordering else {
        return Err(RuntimeError::InvalidOperation(format!(
            "cannot order {} and {}",
            left.type_name(),
            right.type_name()
        )));
    };

    let result = match op {
        Operator::Gt => ordering == Ordering::Greater,
        Operator::Ge => ordering != Ordering::Less,
        Operator::Lt => ordering == Ordering::Less,
        Operator::Le => ordering != Ordering::Greater,
        _ => unreachable!("non-comparison operator routed to execute_comparison"),
    };

    Ok(Value::Bool(result))
}
