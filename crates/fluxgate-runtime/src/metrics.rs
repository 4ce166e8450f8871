//! Metric emission
//!
//! The engine emits metrics through the [`MetricsSink`] trait so deployments
//! can plug in their own backend. [`TracingSink`] logs each event and is the
//! default; [`CollectingSink`] buffers events for assertions in tests.
//! Configured metric rules compile their name, value and tag templates once
//! per snapshot and are evaluated after the response is produced; a rule
//! that fails to evaluate is logged and skipped.

use crate::context::ExecutionContext;
use crate::eval;
use fluxgate_core::config::{MetricKind, MetricRuleConfig};
use fluxgate_core::{CompileError, Program, Template, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// Backend seam for metric delivery
pub trait MetricsSink: Send + Sync {
    fn count(&self, name: &str, value: f64, tags: &HashMap<String, String>);
    fn gauge(&self, name: &str, value: f64, tags: &HashMap<String, String>);
    fn histogram(&self, name: &str, value: f64, tags: &HashMap<String, String>);
}

/// Sink that logs every event through tracing
#[derive(Debug, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn count(&self, name: &str, value: f64, tags: &HashMap<String, String>) {
        tracing::info!(metric = %name, value, ?tags, kind = "count", "metric");
    }

    fn gauge(&self, name: &str, value: f64, tags: &HashMap<String, String>) {
        tracing::info!(metric = %name, value, ?tags, kind = "gauge", "metric");
    }

    fn histogram(&self, name: &str, value: f64, tags: &HashMap<String, String>) {
        tracing::info!(metric = %name, value, ?tags, kind = "histogram", "metric");
    }
}

/// One recorded metric event
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvent {
    pub kind: MetricKind,
    pub name: String,
    pub value: f64,
    pub tags: HashMap<String, String>,
}

/// In-memory sink for tests
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<MetricEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, kind: MetricKind, name: &str, value: f64, tags: &HashMap<String, String>) {
        self.events.lock().unwrap().push(MetricEvent {
            kind,
            name: name.to_string(),
            value,
            tags: tags.clone(),
        });
    }
}

impl MetricsSink for CollectingSink {
    fn count(&self, name: &str, value: f64, tags: &HashMap<String, String>) {
        self.record(MetricKind::Count, name, value, tags);
    }

    fn gauge(&self, name: &str, value: f64, tags: &HashMap<String, String>) {
        self.record(MetricKind::Gauge, name, value, tags);
    }

    fn histogram(&self, name: &str, value: f64, tags: &HashMap<String, String>) {
        self.record(MetricKind::Histogram, name, value, tags);
    }
}

/// A configured metric rule compiled into a snapshot
#[derive(Debug, Clone)]
pub struct CompiledMetricRule {
    kind: MetricKind,
    name: Template,
    value: Program,
    tags: Vec<(String, Template)>,
}

impl CompiledMetricRule {
    pub fn compile(config: &MetricRuleConfig, scopes: &[&str]) -> Result<Self, CompileError> {
        let tags = config
            .tags
            .iter()
            .map(|(key, value)| Ok((key.clone(), Template::compile(value, scopes)?)))
            .collect::<Result<Vec<_>, CompileError>>()?;

        Ok(Self {
            kind: config.kind,
            name: Template::compile(&config.name, scopes)?,
            value: Program::compile(&config.value, scopes)?,
            tags,
        })
    }

    /// Evaluate and deliver one event. An empty value expression counts as 1
    /// for counters and is an error for the other kinds.
    pub fn emit(&self, sink: &dyn MetricsSink, ctx: &ExecutionContext) -> crate::error::Result<()> {
        let name = eval::template_to_string(&self.name, ctx)?;

        let value = match eval::evaluate_value(&self.value, ctx)? {
            Value::Null if self.kind == MetricKind::Count => 1.0,
            Value::Number(n) => n,
            other => {
                return Err(crate::error::RuntimeError::TypeError(format!(
                    "metric '{}' value must be a number, got {}",
                    name,
                    other.type_name()
                )))
            }
        };

        let mut tags = HashMap::with_capacity(self.tags.len());
        for (key, template) in &self.tags {
            tags.insert(key.clone(), eval::template_to_string(template, ctx)?);
        }

        match self.kind {
            MetricKind::Count => sink.count(&name, value, &tags),
            MetricKind::Gauge => sink.gauge(&name, value, &tags),
            MetricKind::Histogram => sink.histogram(&name, value, &tags),
        }

        Ok(())
    }
}

/// Run all metric rules; a failing rule never fails the request
pub fn run_metric_rules(
    rules: &[CompiledMetricRule],
    sink: &dyn MetricsSink,
    ctx: &ExecutionContext,
) {
    for rule in rules {
        if let Err(e) = rule.emit(sink, ctx) {
            tracing::warn!(error = %e, "metric rule evaluation failed, skipping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxgate_core::DEFAULT_SCOPES;

    fn rule(kind: &str, name: &str, value: &str, tags: &[(&str, &str)]) -> CompiledMetricRule {
        CompiledMetricRule::compile(
            &MetricRuleConfig {
                kind: serde_json::from_value(serde_json::Value::String(kind.to_string())).unwrap(),
                name: name.to_string(),
                value: value.to_string(),
                tags: tags
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
            DEFAULT_SCOPES,
        )
        .unwrap()
    }

    fn ctx() -> ExecutionContext {
        let mut input = HashMap::new();
        input.insert("amount".to_string(), Value::Number(42.0));
        ExecutionContext::new(input, HashMap::new())
    }

    #[test]
    fn test_count_defaults_to_one() {
        let sink = CollectingSink::new();
        rule("count", "requests", "", &[]).emit(&sink, &ctx()).unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, MetricKind::Count);
        assert_eq!(events[0].name, "requests");
        assert_eq!(events[0].value, 1.0);
    }

    #[test]
    fn test_histogram_with_expression_value_and_tags() {
        let sink = CollectingSink::new();
        rule(
            "histogram",
            "amount_seen",
            "input.amount",
            &[("service", "checkout"), ("bucket", "${input.amount}")],
        )
        .emit(&sink, &ctx())
        .unwrap();

        let events = sink.events();
        assert_eq!(events[0].value, 42.0);
        assert_eq!(events[0].tags.get("service").unwrap(), "checkout");
        assert_eq!(events[0].tags.get("bucket").unwrap(), "42");
    }

    #[test]
    fn test_gauge_requires_numeric_value() {
        let sink = CollectingSink::new();
        let result = rule("gauge", "g", "\"high\"", &[]).emit(&sink, &ctx());
        assert!(result.is_err());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_failing_rule_does_not_panic_the_batch() {
        let sink = CollectingSink::new();
        let rules = vec![
            rule("gauge", "bad", "\"oops\"", &[]),
            rule("count", "good", "", &[]),
        ];

        run_metric_rules(&rules, &sink, &ctx());

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "good");
    }
}
