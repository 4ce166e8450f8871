//! Configuration data model for a declarative service definition
//!
//! These structs are the decoded form of a service's YAML/JSON definition.
//! Loading (file, object store, table lookup) and structural validation live
//! behind the runtime's `ConfigProvider` seam; this module only defines the
//! shape. Everything here is plain data: expressions are still strings and
//! are compiled by the runtime when a snapshot is built.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level service definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service identifier, used in logs and metric tags
    pub name: String,

    /// Per-request deadline in milliseconds for enrichment and downstream
    /// calls (default 10s)
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Middlewares, run in declared order before validation
    #[serde(default)]
    pub middlewares: Vec<MiddlewareConfig>,

    /// Validations run against the parsed input, before any transformation
    #[serde(default)]
    pub input_validations: Vec<ValidationRuleConfig>,

    /// Validations run at the start of the processing phase
    #[serde(default)]
    pub processing_validations: Vec<ValidationRuleConfig>,

    /// Compute rules applied in declared order, writing into `vars`
    #[serde(default)]
    pub transformations: Vec<TransformationRuleConfig>,

    /// Validations run after transformations, before the response is built
    #[serde(default)]
    pub output_validations: Vec<ValidationRuleConfig>,

    /// Response template
    pub output: OutputConfig,

    /// Optional downstream forward of the built response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interceptor: Option<InterceptorConfig>,

    /// Metric registrations evaluated after the response is produced
    #[serde(default)]
    pub metrics: Vec<MetricRuleConfig>,
}

/// Middleware configuration, dispatched by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MiddlewareConfig {
    /// Concurrent multi-source data enrichment; per-source failures are
    /// non-fatal
    Enrichment {
        sources: Vec<SourceConfig>,
    },
    /// Authentication-token injection; failure aborts the request
    Auth {
        /// Instance name; the token lands under `auth.<name>`
        name: String,
        /// Header the token is intended for
        #[serde(default = "default_auth_header")]
        header: String,
        /// Prefix prepended to the raw token in the header value
        #[serde(default = "default_auth_prefix")]
        prefix: String,
    },
}

fn default_auth_header() -> String {
    "Authorization".to_string()
}

fn default_auth_prefix() -> String {
    "Bearer ".to_string()
}

/// One enrichment source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Result key in the `detection` scope
    pub name: String,

    /// Adapter type tag: `fixed`, `rest`, `query`, `parameter_store`,
    /// `secret`, `object`, `keyed_storage`
    pub kind: String,

    /// Adapter parameters; string values may carry `${...}` markers
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,

    /// Headers for adapters that make network calls; values may carry
    /// `${...}` markers
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// A boolean rule with a configured failure response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRuleConfig {
    /// Rule identifier, used in logs
    pub id: String,

    /// Boolean expression; empty means "always passes"
    pub expression: String,

    /// Response returned when the expression is false
    pub on_fail: OnFailConfig,
}

/// Failure response declared on a validation rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnFailConfig {
    /// HTTP status code
    pub code: u16,
    /// Message echoed to the caller
    pub msg: String,
}

/// A conditional compute rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationRuleConfig {
    /// Rule name, used in logs
    pub name: String,

    /// Boolean condition; empty means "always applies"
    #[serde(default)]
    pub condition: String,

    /// Value written when the condition holds
    pub value: String,

    /// Value written when the condition is false; absent means "skip"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub else_value: Option<String>,

    /// Target path, must be `vars.<name>`
    pub target: String,
}

/// Response template: status, headers and a JSON body tree whose scalar
/// strings may carry `${...}` markers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub body: serde_json::Value,
}

fn default_status() -> u16 {
    200
}

/// Downstream forward target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterceptorConfig {
    /// Target URL; may carry `${...}` markers
    pub url: String,

    #[serde(default = "default_forward_method")]
    pub method: HttpMethod,

    /// Extra headers merged over the built response headers; values may
    /// carry `${...}` markers
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_forward_method() -> HttpMethod {
    HttpMethod::Post
}

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

/// Metric registration rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRuleConfig {
    pub kind: MetricKind,

    /// Metric name; may carry `${...}` markers
    pub name: String,

    /// Value expression; empty defaults to `1` for counters
    #[serde(default)]
    pub value: String,

    /// Tag values; may carry `${...}` markers
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Metric instrument kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Count,
    Gauge,
    Histogram,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_minimal_config() {
        let json = r#"{
            "name": "echo",
            "output": { "body": { "result": "ok" } }
        }"#;

        let cfg: ServiceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.name, "echo");
        assert_eq!(cfg.output.status, 200);
        assert!(cfg.middlewares.is_empty());
        assert!(cfg.interceptor.is_none());
    }

    #[test]
    fn test_decode_middleware_tags() {
        let json = r#"[
            { "type": "enrichment", "sources": [
                { "name": "geo", "kind": "fixed", "params": { "value": 1 } }
            ]},
            { "type": "auth", "name": "svc" }
        ]"#;

        let middlewares: Vec<MiddlewareConfig> = serde_json::from_str(json).unwrap();
        assert_eq!(middlewares.len(), 2);
        match &middlewares[0] {
            MiddlewareConfig::Enrichment { sources } => {
                assert_eq!(sources[0].name, "geo");
                assert_eq!(sources[0].kind, "fixed");
            }
            _ => panic!("Expected enrichment middleware"),
        }
        match &middlewares[1] {
            MiddlewareConfig::Auth { name, header, prefix } => {
                assert_eq!(name, "svc");
                assert_eq!(header, "Authorization");
                assert_eq!(prefix, "Bearer ");
            }
            _ => panic!("Expected auth middleware"),
        }
    }

    #[test]
    fn test_decode_validation_rule() {
        let json = r#"{
            "id": "amount_positive",
            "expression": "input.amount > 0",
            "on_fail": { "code": 400, "msg": "Invalid amount" }
        }"#;

        let rule: ValidationRuleConfig = serde_json::from_str(json).unwrap();
        assert_eq!(rule.on_fail.code, 400);
        assert_eq!(rule.on_fail.msg, "Invalid amount");
    }

    #[test]
    fn test_decode_metric_kind() {
        let rule: MetricRuleConfig = serde_json::from_str(
            r#"{ "kind": "histogram", "name": "latency", "value": "vars.elapsed" }"#,
        )
        .unwrap();
        assert_eq!(rule.kind, MetricKind::Histogram);
    }
}
