//! Concurrent data enrichment
//!
//! An enrichment middleware fans out to all of its configured sources at
//! once and writes each result into the `detection` scope under the source's
//! name. A source that fails or times out is logged and skipped; later
//! expressions reading its key see `Null`. Only the whole-request deadline
//! is fatal, never a single source.

pub mod adapter;

pub use adapter::{Adapter, Collaborators, KeyedStore, ObjectStore, ParameterStore, QueryEngine, SecretStore};

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::eval;
use crate::response::CompiledNode;
use anyhow::Context as AnyContext;
use fluxgate_core::config::SourceConfig;
use fluxgate_core::{Template, Value};
use futures::future::join_all;
use std::collections::HashMap;
use std::time::Duration;

/// One enrichment source compiled into a snapshot
#[derive(Clone)]
pub struct CompiledSource {
    pub name: String,
    adapter: Adapter,
    params: Vec<(String, CompiledNode)>,
    headers: Vec<(String, Template)>,
    timeout: Duration,
}

impl CompiledSource {
    /// Resolve the adapter and precompile every parameter and header
    /// template. Fails snapshot construction on unknown kinds, missing
    /// collaborators or malformed templates.
    pub fn compile(
        config: &SourceConfig,
        scopes: &[&str],
        collaborators: &Collaborators,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let adapter = Adapter::from_kind(&config.kind, collaborators, timeout)
            .with_context(|| format!("source '{}'", config.name))?;

        let params = config
            .params
            .iter()
            .map(|(key, value)| {
                let node = CompiledNode::compile(value, scopes)
                    .with_context(|| format!("source '{}' parameter '{}'", config.name, key))?;
                Ok((key.clone(), node))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let headers = config
            .headers
            .iter()
            .map(|(name, value)| {
                let template = Template::compile(value, scopes)
                    .with_context(|| format!("source '{}' header '{}'", config.name, name))?;
                Ok((name.clone(), template))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            name: config.name.clone(),
            adapter,
            params,
            headers,
            timeout,
        })
    }

    /// Evaluate parameter and header templates against the request context
    fn resolve(
        &self,
        ctx: &ExecutionContext,
    ) -> Result<(HashMap<String, Value>, HashMap<String, String>)> {
        let mut params = HashMap::with_capacity(self.params.len());
        for (key, node) in &self.params {
            params.insert(key.clone(), Value::from_json(node.evaluate(ctx)?));
        }

        let mut headers = HashMap::with_capacity(self.headers.len());
        for (name, template) in &self.headers {
            headers.insert(name.clone(), eval::template_to_string(template, ctx)?);
        }

        Ok((params, headers))
    }

    /// Run the source once, with its own timeout
    async fn fetch(&self, ctx: &ExecutionContext) -> anyhow::Result<Value> {
        let (params, headers) = self
            .resolve(ctx)
            .map_err(|e| anyhow::anyhow!("parameter evaluation failed: {}", e))?;

        match tokio::time::timeout(self.timeout, self.adapter.call(&params, &headers)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "timed out after {}ms",
                self.timeout.as_millis()
            )),
        }
    }
}

/// Fan out to all sources concurrently and merge the successes into the
/// `detection` scope. Failures are logged and skipped.
pub async fn run_enrichment(sources: &[CompiledSource], ctx: &mut ExecutionContext) {
    let snapshot: &ExecutionContext = ctx;
    let calls = sources
        .iter()
        .map(|source| async move { (source.name.as_str(), source.fetch(snapshot).await) });
    let results = join_all(calls).await;

    for (name, result) in results {
        match result {
            Ok(value) => {
                tracing::debug!(source = %name, "enrichment source resolved");
                ctx.detection.insert(name.to_string(), value);
            }
            Err(e) => {
                tracing::warn!(source = %name, error = %e, "enrichment source failed, skipping");
            }
        }
    }
}
