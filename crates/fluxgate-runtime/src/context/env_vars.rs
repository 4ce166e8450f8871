//! Environment variables loader
//!
//! Builds the `env` scope from a snapshot of the process environment.
//! Only `FLUXGATE_`-prefixed variables are exposed, with the prefix
//! stripped and the name lowercased (`FLUXGATE_REGION` -> `env.region`).

use fluxgate_core::Value;
use std::collections::HashMap;

/// Load environment variables (env scope)
pub(super) fn load_environment_vars() -> HashMap<String, Value> {
    let mut env = HashMap::new();

    for (key, value) in std::env::vars() {
        if let Some(stripped) = key.strip_prefix("FLUXGATE_") {
            env.insert(stripped.to_lowercase(), parse_env_value(&value));
        }
    }

    env
}

/// Parse an environment variable value to the closest typed value
fn parse_env_value(value: &str) -> Value {
    if let Ok(num) = value.parse::<f64>() {
        return Value::Number(num);
    }

    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" => return Value::Bool(true),
        "false" | "no" | "off" => return Value::Bool(false),
        _ => {}
    }

    // JSON objects/arrays pass through structured
    if value.starts_with('{') || value.starts_with('[') {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(value) {
            return Value::from_json(json);
        }
    }

    Value::String(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_value_types() {
        assert_eq!(parse_env_value("42"), Value::Number(42.0));
        assert_eq!(parse_env_value("true"), Value::Bool(true));
        assert_eq!(parse_env_value("off"), Value::Bool(false));
        assert_eq!(
            parse_env_value("eu-west-1"),
            Value::String("eu-west-1".to_string())
        );
    }

    #[test]
    fn test_parse_env_value_json() {
        match parse_env_value(r#"{"a": 1}"#) {
            Value::Object(map) => assert_eq!(map.get("a"), Some(&Value::Number(1.0))),
            other => panic!("Expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_prefix_filtering() {
        std::env::set_var("FLUXGATE_TEST_REGION", "us-east-1");
        std::env::set_var("UNRELATED_VAR", "x");

        let env = load_environment_vars();
        assert_eq!(
            env.get("test_region"),
            Some(&Value::String("us-east-1".to_string()))
        );
        assert!(!env.contains_key("unrelated_var"));

        std::env::remove_var("FLUXGATE_TEST_REGION");
        std::env::remove_var("UNRELATED_VAR");
    }
}
