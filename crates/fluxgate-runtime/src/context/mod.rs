//! Per-request execution context

mod env_vars;
mod field_lookup;

use crate::error::{Result, RuntimeError};
use fluxgate_core::Value;
use std::collections::HashMap;

/// Execution context for one request.
///
/// Holds the named scopes every expression evaluates against. All scopes
/// exist from the moment a request starts; `vars` and `detection` begin
/// empty and are only appended to. A context is created at the start of
/// `Engine::execute` and dropped at the end, never shared between requests.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Parsed request body (read-only)
    pub input: HashMap<String, Value>,

    /// Inbound request headers (read-only)
    pub header: HashMap<String, Value>,

    /// Process environment snapshot (read-only)
    pub env: HashMap<String, Value>,

    /// Scratch values written by transformations
    pub vars: HashMap<String, Value>,

    /// Enrichment results, one key per source
    pub detection: HashMap<String, Value>,

    /// Auth tokens, one sub-map per auth middleware instance
    pub auth: HashMap<String, Value>,
}

impl ExecutionContext {
    /// Create a context from the parsed input and inbound headers
    pub fn new(input: HashMap<String, Value>, headers: HashMap<String, String>) -> Self {
        let header = headers
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();

        Self {
            input,
            header,
            env: env_vars::load_environment_vars(),
            vars: HashMap::new(),
            detection: HashMap::new(),
            auth: HashMap::new(),
        }
    }

    /// Load a field value from any scope.
    ///
    /// Supports dot notation like `input.amount`, `detection.geo.country`
    /// or `auth.svc.token`. Missing leaves below a known scope resolve to
    /// `Null` so rules can handle absent fields gracefully; an unknown scope
    /// root is an error (normally impossible after compile-time checks).
    pub fn load_field(&self, path: &[String]) -> Result<Value> {
        let Some(root) = path.first() else {
            return Err(RuntimeError::FieldNotFound("empty path".to_string()));
        };

        let scope = match root.as_str() {
            "input" => &self.input,
            "header" => &self.header,
            "env" => &self.env,
            "vars" => &self.vars,
            "detection" => &self.detection,
            "auth" => &self.auth,
            other => {
                return Err(RuntimeError::FieldNotFound(format!(
                    "unknown scope: {}",
                    other
                )))
            }
        };

        let remaining = &path[1..];
        if remaining.is_empty() {
            return Ok(Value::Object(scope.clone()));
        }

        Ok(field_lookup::get_nested_value(scope, remaining))
    }
}
