//! Response template builder
//!
//! The output step's body/headers/status are compiled once when a snapshot
//! is built (and again on every reload), so a malformed template is rejected
//! at boot instead of at first request. The body is compiled into a
//! [`CompiledNode`] tree: maps and lists recurse, and every scalar string is
//! compiled as an interpolation template. Header expressions compile to
//! reusable templates the same way.

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::eval;
use fluxgate_core::config::OutputConfig;
use fluxgate_core::{CompileError, Template};
use std::collections::HashMap;

/// A response template node with all expressions precompiled
#[derive(Debug, Clone)]
pub enum CompiledNode {
    /// Non-string scalar, emitted byte-for-byte as configured (integers
    /// stay integers)
    Literal(serde_json::Value),
    /// Scalar string, possibly carrying `${...}` markers
    Template(Template),
    Array(Vec<CompiledNode>),
    Object(Vec<(String, CompiledNode)>),
}

impl CompiledNode {
    /// Compile a JSON-like template tree against a declared scope set
    pub fn compile(
        template: &serde_json::Value,
        scopes: &[&str],
    ) -> Result<CompiledNode, CompileError> {
        match template {
            serde_json::Value::String(s) => Ok(CompiledNode::Template(Template::compile(s, scopes)?)),
            serde_json::Value::Array(items) => Ok(CompiledNode::Array(
                items
                    .iter()
                    .map(|item| CompiledNode::compile(item, scopes))
                    .collect::<Result<_, _>>()?,
            )),
            serde_json::Value::Object(map) => Ok(CompiledNode::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), CompiledNode::compile(v, scopes)?)))
                    .collect::<Result<_, CompileError>>()?,
            )),
            scalar => Ok(CompiledNode::Literal(scalar.clone())),
        }
    }

    /// Evaluate the node tree against a request context
    pub fn evaluate(&self, ctx: &ExecutionContext) -> crate::error::Result<serde_json::Value> {
        match self {
            CompiledNode::Literal(v) => Ok(v.clone()),
            CompiledNode::Template(t) => Ok(eval::render_template(t, ctx)?.to_json()),
            CompiledNode::Array(items) => Ok(serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| item.evaluate(ctx))
                    .collect::<crate::error::Result<_>>()?,
            )),
            CompiledNode::Object(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for (key, node) in entries {
                    map.insert(key.clone(), node.evaluate(ctx)?);
                }
                Ok(serde_json::Value::Object(map))
            }
        }
    }
}

/// A fully built response, before the optional downstream forward
#[derive(Debug, Clone)]
pub struct BuiltResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

/// Compiled response builder held by a snapshot
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    status: u16,
    body: CompiledNode,
    headers: Vec<(String, Template)>,
}

impl ResponseBuilder {
    /// Eagerly compile the whole output template; any malformed expression
    /// fails construction.
    pub fn compile(config: &OutputConfig, scopes: &[&str]) -> Result<Self, CompileError> {
        let headers = config
            .headers
            .iter()
            .map(|(name, value)| Ok((name.clone(), Template::compile(value, scopes)?)))
            .collect::<Result<Vec<_>, CompileError>>()?;

        Ok(Self {
            status: config.status,
            body: CompiledNode::compile(&config.body, scopes)?,
            headers,
        })
    }

    /// Evaluate the template against the request context and serialize the
    /// body to JSON bytes.
    pub fn build(&self, ctx: &ExecutionContext) -> Result<BuiltResponse, EngineError> {
        let body_value = self.body.evaluate(ctx).map_err(|e| {
            tracing::error!(error = %e, "response body evaluation failed");
            EngineError::Internal(format!("response body: {}", e))
        })?;

        let body = serde_json::to_vec(&body_value)
            .map_err(|e| EngineError::Internal(format!("response serialization: {}", e)))?;

        let mut headers = HashMap::with_capacity(self.headers.len());
        for (name, template) in &self.headers {
            let value = eval::template_to_string(template, ctx).map_err(|e| {
                tracing::error!(header = %name, error = %e, "response header evaluation failed");
                EngineError::Internal(format!("response header '{}': {}", name, e))
            })?;
            headers.insert(name.clone(), value);
        }

        Ok(BuiltResponse {
            status: self.status,
            body,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxgate_core::{Value, DEFAULT_SCOPES};
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        let mut input = HashMap::new();
        input.insert("amount".to_string(), Value::Number(100.0));
        let mut context = ExecutionContext::new(input, HashMap::new());
        context
            .vars
            .insert("doubled".to_string(), Value::Number(200.0));
        context
    }

    fn builder(body: serde_json::Value) -> ResponseBuilder {
        ResponseBuilder::compile(
            &OutputConfig {
                status: 200,
                headers: HashMap::new(),
                body,
            },
            DEFAULT_SCOPES,
        )
        .unwrap()
    }

    #[test]
    fn test_literal_body_passthrough() {
        let b = builder(json!({"result": "ok", "count": 3}));
        let response = b.build(&ctx()).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(parsed, json!({"result": "ok", "count": 3}));
    }

    #[test]
    fn test_integer_literals_stay_integers() {
        let b = builder(json!({"count": 3, "nested": {"version": 1}, "list": [7]}));
        let response = b.build(&ctx()).unwrap();
        let text = String::from_utf8(response.body).unwrap();
        assert!(text.contains("\"count\":3"), "got {}", text);
        assert!(!text.contains("3.0"), "got {}", text);
        assert!(text.contains("\"version\":1"), "got {}", text);
        assert!(text.contains("[7]"), "got {}", text);
    }

    #[test]
    fn test_single_expression_preserves_type() {
        let b = builder(json!({"result": "${vars.doubled}"}));
        let response = b.build(&ctx()).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(parsed, json!({"result": 200.0}));
    }

    #[test]
    fn test_nested_arrays_and_objects() {
        let b = builder(json!({
            "items": [{"v": "${input.amount}"}, {"v": "fixed"}],
            "meta": {"null_field": null}
        }));
        let response = b.build(&ctx()).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(
            parsed,
            json!({
                "items": [{"v": 100.0}, {"v": "fixed"}],
                "meta": {"null_field": null}
            })
        );
    }

    #[test]
    fn test_headers_are_evaluated() {
        let mut headers = HashMap::new();
        headers.insert("x-amount".to_string(), "${input.amount}".to_string());
        headers.insert("x-static".to_string(), "v1".to_string());

        let b = ResponseBuilder::compile(
            &OutputConfig {
                status: 201,
                headers,
                body: json!({}),
            },
            DEFAULT_SCOPES,
        )
        .unwrap();

        let response = b.build(&ctx()).unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.headers.get("x-amount").unwrap(), "100");
        assert_eq!(response.headers.get("x-static").unwrap(), "v1");
    }

    #[test]
    fn test_malformed_template_rejected_at_compile() {
        let result = ResponseBuilder::compile(
            &OutputConfig {
                status: 200,
                headers: HashMap::new(),
                body: json!({"bad": "${unknown_scope.x}"}),
            },
            DEFAULT_SCOPES,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_body_evaluation_failure_is_internal() {
        let b = builder(json!({"bad": "${len(input.amount)}"}));
        assert!(matches!(b.build(&ctx()), Err(EngineError::Internal(_))));
    }
}
