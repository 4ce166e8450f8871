//! Binary operator execution

use super::comparison::execute_comparison;
use crate::error::{Result, RuntimeError};
use fluxgate_core::ast::Operator;
use fluxgate_core::Value;

/// Execute a binary operation
///
/// Null in any operand returns Null, so expressions over missing fields
/// propagate instead of erroring mid-way.
pub(crate) fn execute_binary_op(left: &Value, op: &Operator, right: &Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        tracing::debug!(?left, ?op, ?right, "null in binary operation, returning null");
        return Ok(Value::Null);
    }

    if op.is_comparison() {
        return execute_comparison(left, op, right);
    }

    match (left, op, right) {
        // Arithmetic operations
        (Value::Number(l), Operator::Add, Value::Number(r)) => Ok(Value::Number(l + r)),
        (Value::Number(l), Operator::Sub, Value::Number(r)) => Ok(Value::Number(l - r)),
        (Value::Number(l), Operator::Mul, Value::Number(r)) => Ok(Value::Number(l * r)),
        (Value::Number(l), Operator::Div, Value::Number(r)) => {
            if *r == 0.0 {
                Err(RuntimeError::DivisionByZero)
            } else {
                Ok(Value::Number(l / r))
            }
        }
        (Value::Number(l), Operator::Mod, Value::Number(r)) => {
            if *r == 0.0 {
                Err(RuntimeError::DivisionByZero)
            } else {
                Ok(Value::Number(l % r))
            }
        }

        // String concatenation
        (Value::String(l), Operator::Add, Value::String(r)) => {
            Ok(Value::String(format!("{}{}", l, r)))
        }

        // Logical operations (short-circuiting happens in the evaluator;
        // this is the eager fallback)
        (Value::Bool(l), Operator::And, Value::Bool(r)) => Ok(Value::Bool(*l && *r)),
        (Value::Bool(l), Operator::Or, Value::Bool(r)) => Ok(Value::Bool(*l || *r)),

        // String operations
        (Value::String(l), Operator::Contains, Value::String(r)) => Ok(Value::Bool(l.contains(r))),
        (Value::String(l), Operator::StartsWith, Value::String(r)) => {
            Ok(Value::Bool(l.starts_with(r)))
        }
        (Value::String(l), Operator::EndsWith, Value::String(r)) => {
            Ok(Value::Bool(l.ends_with(r)))
        }

        // Array membership
        (Value::Array(arr), Operator::Contains, val) => {
            Ok(Value::Bool(arr.iter().any(|v| v == val)))
        }
        (val, Operator::In, Value::Array(arr)) => Ok(Value::Bool(arr.iter().any(|v| v == val))),
        (val, Operator::NotIn, Value::Array(arr)) => {
            Ok(Value::Bool(!arr.iter().any(|v| v == val)))
        }

        _ => Err(RuntimeError::InvalidOperation(format!(
            "cannot apply {:?} to {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_propagation() {
        let result =
            execute_binary_op(&Value::Null, &Operator::Add, &Value::Number(1.0)).unwrap();
        assert_eq!(result, Value::Null);
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            execute_binary_op(&Value::Number(6.0), &Operator::Mul, &Value::Number(7.0)).unwrap(),
            Value::Number(42.0)
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            execute_binary_op(&Value::Number(1.0), &Operator::Div, &Value::Number(0.0)),
            Err(RuntimeError::DivisionByZero)
        ));
    }

    #[test]
    fn test_string_concat() {
        assert_eq!(
            execute_binary_op(
                &Value::String("foo".to_string()),
                &Operator::Add,
                &Value::String("bar".to_string())
            )
            .unwrap(),
            Value::String("foobar".to_string())
        );
    }

    #[test]
    fn test_membership() {
        let arr = Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(
            execute_binary_op(&Value::Number(2.0), &Operator::In, &arr).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            execute_binary_op(&Value::Number(3.0), &Operator::NotIn, &arr).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_type_mismatch() {
        assert!(execute_binary_op(
            &Value::Bool(true),
            &Operator::Add,
            &Value::Number(1.0)
        )
        .is_err());
    }
}
