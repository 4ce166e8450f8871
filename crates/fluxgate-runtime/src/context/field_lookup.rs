//! Nested field lookup over JSON-like values

use fluxgate_core::Value;
use std::collections::HashMap;

/// Navigate a dotted path inside a scope map.
///
/// Objects are traversed by key, arrays by numeric segment. Any missing
/// step resolves to `Null`.
pub(super) fn get_nested_value(scope: &HashMap<String, Value>, path: &[String]) -> Value {
    let Some(first) = path.first() else {
        return Value::Null;
    };

    let Some(mut current) = scope.get(first) else {
        tracing::debug!(field = %first, "field not found, returning null");
        return Value::Null;
    };

    for segment in &path[1..] {
        current = match current {
            Value::Object(map) => match map.get(segment) {
                Some(v) => v,
                None => return Value::Null,
            },
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(v) => v,
                None => return Value::Null,
            },
            _ => return Value::Null,
        };
    }

    current.clone()
}
