//! Built-in expression functions

use crate::error::{Result, RuntimeError};
use fluxgate_core::Value;

/// Dispatch a function call on already-evaluated arguments
pub(super) fn call(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "len" => {
            let [arg] = args else {
                return Err(arity_error(name, 1, args.len()));
            };
            match arg {
                Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
                Value::Array(a) => Ok(Value::Number(a.len() as f64)),
                Value::Object(o) => Ok(Value::Number(o.len() as f64)),
                Value::Null => Ok(Value::Null),
                other => Err(RuntimeError::TypeError(format!(
                    "len() expects string, array or object, got {}",
                    other.type_name()
                ))),
            }
        }

        "upper" | "lower" => {
            let [arg] = args else {
                return Err(arity_error(name, 1, args.len()));
            };
            match arg {
                Value::String(s) => Ok(Value::String(if name == "upper" {
                    s.to_uppercase()
                } else {
                    s.to_lowercase()
                })),
                Value::Null => Ok(Value::Null),
                other => Err(RuntimeError::TypeError(format!(
                    "{}() expects a string, got {}",
                    name,
                    other.type_name()
                ))),
            }
        }

        "coalesce" => Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null)),

        "number" => {
            let [arg] = args else {
                return Err(arity_error(name, 1, args.len()));
            };
            match arg {
                Value::Number(n) => Ok(Value::Number(*n)),
                Value::Bool(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
                Value::String(s) => s.trim().parse::<f64>().map(Value::Number).map_err(|_| {
                    RuntimeError::TypeError(format!("number() cannot parse '{}'", s))
                }),
                Value::Null => Ok(Value::Null),
                other => Err(RuntimeError::TypeError(format!(
                    "number() expects a scalar, got {}",
                    other.type_name()
                ))),
            }
        }

        "string" => {
            let [arg] = args else {
                return Err(arity_error(name, 1, args.len()));
            };
            Ok(Value::String(arg.render()))
        }

        _ => Err(RuntimeError::InvalidOperation(format!(
            "unknown function: {}",
            name
        ))),
    }
}

fn arity_error(name: &str, expected: usize, got: usize) -> RuntimeError {
    RuntimeError::InvalidOperation(format!(
        "{}() expects {} argument(s), got {}",
        name, expected, got
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len() {
        assert_eq!(
            call("len", &[Value::String("abc".to_string())]).unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(
            call("len", &[Value::Array(vec![Value::Null])]).unwrap(),
            Value::Number(1.0)
        );
        assert!(call("len", &[Value::Number(1.0)]).is_err());
        assert!(call("len", &[]).is_err());
    }

    #[test]
    fn test_case_functions() {
        assert_eq!(
            call("upper", &[Value::String("us".to_string())]).unwrap(),
            Value::String("US".to_string())
        );
        assert_eq!(
            call("lower", &[Value::String("US".to_string())]).unwrap(),
            Value::String("us".to_string())
        );
    }

    #[test]
    fn test_coalesce() {
        assert_eq!(
            call("coalesce", &[Value::Null, Value::Number(2.0)]).unwrap(),
            Value::Number(2.0)
        );
        assert_eq!(call("coalesce", &[Value::Null, Value::Null]).unwrap(), Value::Null);
    }

    #[test]
    fn test_number() {
        assert_eq!(
            call("number", &[Value::String(" 42 ".to_string())]).unwrap(),
            Value::Number(42.0)
        );
        assert_eq!(
            call("number", &[Value::Bool(true)]).unwrap(),
            Value::Number(1.0)
        );
        assert!(call("number", &[Value::String("abc".to_string())]).is_err());
    }

    #[test]
    fn test_string() {
        assert_eq!(
            call("string", &[Value::Number(200.0)]).unwrap(),
            Value::String("200".to_string())
        );
    }

    #[test]
    fn test_unknown_function() {
        assert!(call("bogus", &[]).is_err());
    }
}
