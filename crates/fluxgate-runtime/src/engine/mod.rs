//! Request pipeline orchestrator
//!
//! The engine owns the current compiled snapshot and drives every request
//! through the pipeline: parse input, middlewares in declared order,
//! validation phases, transformations, response build, optional downstream
//! forward. Reloads build a complete replacement snapshot off to the side
//! and swap it in atomically; in-flight requests finish on the snapshot
//! they started with.

pub mod snapshot;

pub use snapshot::{AuthMiddleware, EngineSnapshot, Middleware};

use crate::context::ExecutionContext;
use crate::credentials::TokenFetcher;
use crate::enrichment::{self, Collaborators, KeyedStore, ObjectStore, ParameterStore, QueryEngine, SecretStore};
use crate::error::EngineError;
use crate::metrics::{self, MetricsSink, TracingSink};
use crate::provider::ConfigProvider;
use crate::response::BuiltResponse;
use crate::transform;
use crate::validation;
use fluxgate_core::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// An incoming request: raw JSON payload plus transport headers
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
}

/// The response handed back to the embedding server
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

/// Configures and constructs an [`Engine`]
pub struct EngineBuilder {
    provider: Arc<dyn ConfigProvider>,
    fetchers: HashMap<String, Arc<dyn TokenFetcher>>,
    collaborators: Collaborators,
    sink: Arc<dyn MetricsSink>,
}

impl EngineBuilder {
    pub fn new(provider: Arc<dyn ConfigProvider>) -> Self {
        Self {
            provider,
            fetchers: HashMap::new(),
            collaborators: Collaborators::default(),
            sink: Arc::new(TracingSink),
        }
    }

    /// Register the token fetcher backing the auth middleware of the same
    /// name
    pub fn token_fetcher(mut self, name: impl Into<String>, fetcher: Arc<dyn TokenFetcher>) -> Self {
        self.fetchers.insert(name.into(), fetcher);
        self
    }

    pub fn metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn query_engine(mut self, engine: Arc<dyn QueryEngine>) -> Self {
        self.collaborators.query = Some(engine);
        self
    }

    pub fn parameter_store(mut self, store: Arc<dyn ParameterStore>) -> Self {
        self.collaborators.parameters = Some(store);
        self
    }

    pub fn secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.collaborators.secrets = Some(store);
        self
    }

    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.collaborators.objects = Some(store);
        self
    }

    pub fn keyed_store(mut self, store: Arc<dyn KeyedStore>) -> Self {
        self.collaborators.storage = Some(store);
        self
    }

    /// Load and compile the initial snapshot. Any configuration or
    /// credential failure here fails the boot.
    pub async fn build(self) -> Result<Engine, EngineError> {
        let config = self
            .provider
            .load()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let snapshot = EngineSnapshot::compile(&config, &self.fetchers, &self.collaborators).await?;
        tracing::info!(service = %snapshot.name, "engine started");

        Ok(Engine {
            provider: self.provider,
            fetchers: self.fetchers,
            collaborators: self.collaborators,
            sink: self.sink,
            snapshot: RwLock::new(Arc::new(snapshot)),
            reload_lock: tokio::sync::Mutex::new(()),
        })
    }
}

/// The running engine
pub struct Engine {
    provider: Arc<dyn ConfigProvider>,
    fetchers: HashMap<String, Arc<dyn TokenFetcher>>,
    collaborators: Collaborators,
    sink: Arc<dyn MetricsSink>,
    snapshot: RwLock<Arc<EngineSnapshot>>,
    reload_lock: tokio::sync::Mutex<()>,
}

impl Engine {
    pub fn builder(provider: Arc<dyn ConfigProvider>) -> EngineBuilder {
        EngineBuilder::new(provider)
    }

    fn current(&self) -> Arc<EngineSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap())
    }

    /// Run one request through the pipeline. Never returns an error; every
    /// failure maps to a response with the taxonomy's status and public
    /// message.
    pub async fn execute(&self, request: Request) -> Response {
        let snapshot = self.current();
        let request_id = new_request_id();
        let started = Instant::now();

        tracing::debug!(%request_id, service = %snapshot.name, "request started");

        let (response, status_class) = match self.run(&snapshot, request).await {
            Ok((built, ctx)) => {
                metrics::run_metric_rules(&snapshot.metric_rules, self.sink.as_ref(), &ctx);
                let mut headers = built.headers;
                headers
                    .entry("content-type".to_string())
                    .or_insert_with(|| "application/json".to_string());
                (
                    Response {
                        status: built.status,
                        body: built.body,
                        headers,
                    },
                    built.status.to_string(),
                )
            }
            Err(e) => {
                tracing::warn!(%request_id, error = %e, status = e.status(), "request failed");
                (error_response(&e), e.status().to_string())
            }
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut tags = HashMap::new();
        tags.insert("service".to_string(), snapshot.name.clone());
        tags.insert("status".to_string(), status_class);
        self.sink.count("engine.requests", 1.0, &tags);
        self.sink.histogram("engine.request_duration_ms", elapsed_ms, &tags);

        tracing::debug!(%request_id, status = response.status, elapsed_ms, "request finished");
        response
    }

    async fn run(
        &self,
        snapshot: &EngineSnapshot,
        request: Request,
    ) -> Result<(BuiltResponse, ExecutionContext), EngineError> {
        let input = parse_input(&request.payload)?;
        let mut ctx = ExecutionContext::new(input, request.headers);

        for middleware in &snapshot.middlewares {
            match middleware {
                Middleware::Enrichment(sources) => {
                    enrichment::run_enrichment(sources, &mut ctx).await;
                }
                Middleware::Auth(auth) => apply_auth(auth, &mut ctx)?,
            }
        }

        validation::run_validations(&snapshot.input_validations, &ctx)?;
        validation::run_validations(&snapshot.processing_validations, &ctx)?;
        transform::run_transformations(&snapshot.transformations, &mut ctx)?;
        validation::run_validations(&snapshot.output_validations, &ctx)?;

        let mut built = snapshot.response.build(&ctx)?;

        if let Some(interceptor) = &snapshot.interceptor {
            built = interceptor.forward(&built, &ctx).await?;
        }

        Ok((built, ctx))
    }

    /// Rebuild the snapshot from the provider's current definition and swap
    /// it in. On any failure the old snapshot stays active untouched.
    /// Reloads are serialized; concurrent callers queue.
    pub async fn reload(&self) -> Result<(), EngineError> {
        let _guard = self.reload_lock.lock().await;

        let config = self
            .provider
            .load()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let next = EngineSnapshot::compile(&config, &self.fetchers, &self.collaborators).await?;
        tracing::info!(service = %next.name, "configuration reloaded");

        let old = {
            let mut guard = self.snapshot.write().unwrap();
            std::mem::replace(&mut *guard, Arc::new(next))
        };
        old.stop();

        Ok(())
    }

    /// Stop background work. The engine still answers requests afterwards,
    /// but managed credentials stop refreshing.
    pub fn shutdown(&self) {
        self.current().stop();
        tracing::info!("engine shut down");
    }
}

/// Empty payload means an empty input object; anything else must parse as a
/// JSON object.
fn parse_input(payload: &[u8]) -> Result<HashMap<String, Value>, EngineError> {
    if payload.is_empty() {
        return Ok(HashMap::new());
    }

    let parsed: serde_json::Value =
        serde_json::from_slice(payload).map_err(|_| EngineError::BadRequest)?;

    match Value::from_json(parsed) {
        Value::Object(map) => Ok(map),
        _ => Err(EngineError::BadRequest),
    }
}

/// Inject `auth.<name>` as an object carrying the raw token, the intended
/// header name, and the ready-to-send header value.
fn apply_auth(auth: &AuthMiddleware, ctx: &mut ExecutionContext) -> Result<(), EngineError> {
    let token = auth
        .manager
        .token()
        .map_err(|e| EngineError::Dependency(e.to_string()))?;

    let mut entry = HashMap::new();
    entry.insert("token".to_string(), Value::String(token.clone()));
    entry.insert("header".to_string(), Value::String(auth.header.clone()));
    entry.insert(
        "value".to_string(),
        Value::String(format!("{}{}", auth.prefix, token)),
    );

    ctx.auth.insert(auth.name.clone(), Value::Object(entry));
    Ok(())
}

fn error_response(error: &EngineError) -> Response {
    let body = serde_json::json!({ "error": error.public_message() });
    let mut headers = HashMap::new();
    headers.insert("content-type".to_string(), "application/json".to_string());

    Response {
        status: error.status(),
        // Serializing a flat string map cannot fail
        body: serde_json::to_vec(&body).unwrap_or_default(),
        headers,
    }
}

fn new_request_id() -> String {
    format!(
        "req_{}_{:06x}",
        chrono::Utc::now().format("%Y%m%d%H%M%S"),
        rand::random::<u32>() & 0xff_ffff
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input_empty_payload() {
        assert!(parse_input(b"").unwrap().is_empty());
    }

    #[test]
    fn test_parse_input_rejects_non_object() {
        assert!(matches!(parse_input(b"[1,2]"), Err(EngineError::BadRequest)));
        assert!(matches!(parse_input(b"not json"), Err(EngineError::BadRequest)));
    }

    #[test]
    fn test_request_id_shape() {
        let id = new_request_id();
        assert!(id.starts_with("req_"));
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 14);
        assert_eq!(parts[2].len(), 6);
    }

    #[test]
    fn test_error_response_body() {
        let response = error_response(&EngineError::BadRequest);
        assert_eq!(response.status, 400);
        let parsed: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(parsed, serde_json::json!({"error": "invalid request body"}));
    }
}
