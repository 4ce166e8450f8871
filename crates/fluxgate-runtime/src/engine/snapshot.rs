//! Immutable compiled form of one service definition
//!
//! A snapshot is built from a [`ServiceConfig`] by compiling every
//! expression, template, rule and adapter up front; request handling only
//! ever touches compiled parts. Snapshots are immutable after construction
//! and shared behind an `Arc`, so a reload can swap in a new one while
//! in-flight requests keep the one they started with.

use crate::credentials::{CredentialManager, TokenFetcher};
use crate::enrichment::{Collaborators, CompiledSource};
use crate::error::EngineError;
use crate::interceptor::Interceptor;
use crate::metrics::CompiledMetricRule;
use crate::response::ResponseBuilder;
use crate::transform::CompiledTransformation;
use crate::validation::CompiledValidation;
use fluxgate_core::config::{MiddlewareConfig, ServiceConfig};
use fluxgate_core::DEFAULT_SCOPES;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// One compiled middleware
pub enum Middleware {
    Enrichment(Vec<CompiledSource>),
    Auth(AuthMiddleware),
}

/// Compiled auth middleware: injects a managed token into the `auth` scope
pub struct AuthMiddleware {
    pub name: String,
    pub header: String,
    pub prefix: String,
    pub manager: Arc<CredentialManager>,
}

/// Fully compiled service definition
pub struct EngineSnapshot {
    pub name: String,
    pub timeout: Duration,
    pub middlewares: Vec<Middleware>,
    pub input_validations: Vec<CompiledValidation>,
    pub processing_validations: Vec<CompiledValidation>,
    pub transformations: Vec<CompiledTransformation>,
    pub output_validations: Vec<CompiledValidation>,
    pub response: ResponseBuilder,
    pub interceptor: Option<Interceptor>,
    pub metric_rules: Vec<CompiledMetricRule>,
    credentials: Vec<Arc<CredentialManager>>,
}

impl EngineSnapshot {
    /// Compile a definition and start its credential managers. Compilation
    /// has no side effects; managers are started only after everything else
    /// succeeded, and are stopped again if a later one fails to start.
    pub async fn compile(
        config: &ServiceConfig,
        fetchers: &HashMap<String, Arc<dyn TokenFetcher>>,
        collaborators: &Collaborators,
    ) -> Result<Self, EngineError> {
        let timeout = config
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        let mut middlewares = Vec::with_capacity(config.middlewares.len());
        let mut credentials = Vec::new();

        for middleware in &config.middlewares {
            match middleware {
                MiddlewareConfig::Enrichment { sources } => {
                    let compiled = sources
                        .iter()
                        .map(|s| {
                            CompiledSource::compile(s, DEFAULT_SCOPES, collaborators, timeout)
                                .map_err(|e| EngineError::Config(e.to_string()))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    middlewares.push(Middleware::Enrichment(compiled));
                }
                MiddlewareConfig::Auth { name, header, prefix } => {
                    let fetcher = fetchers.get(name).cloned().ok_or_else(|| {
                        EngineError::Config(format!("no token fetcher registered for auth '{}'", name))
                    })?;
                    let manager = Arc::new(CredentialManager::new(name.clone(), fetcher));
                    credentials.push(Arc::clone(&manager));
                    middlewares.push(Middleware::Auth(AuthMiddleware {
                        name: name.clone(),
                        header: header.clone(),
                        prefix: prefix.clone(),
                        manager,
                    }));
                }
            }
        }

        let compile_rules = |rules: &[fluxgate_core::config::ValidationRuleConfig]| {
            rules
                .iter()
                .map(|r| CompiledValidation::compile(r, DEFAULT_SCOPES).map_err(EngineError::from))
                .collect::<Result<Vec<_>, _>>()
        };

        let snapshot = Self {
            name: config.name.clone(),
            timeout,
            middlewares,
            input_validations: compile_rules(&config.input_validations)?,
            processing_validations: compile_rules(&config.processing_validations)?,
            transformations: config
                .transformations
                .iter()
                .map(|t| CompiledTransformation::compile(t, DEFAULT_SCOPES).map_err(EngineError::from))
                .collect::<Result<Vec<_>, _>>()?,
            output_validations: compile_rules(&config.output_validations)?,
            response: ResponseBuilder::compile(&config.output, DEFAULT_SCOPES)?,
            interceptor: config
                .interceptor
                .as_ref()
                .map(|i| Interceptor::compile(i, DEFAULT_SCOPES, timeout))
                .transpose()
                .map_err(|e| EngineError::Config(e.to_string()))?,
            metric_rules: config
                .metrics
                .iter()
                .map(|m| CompiledMetricRule::compile(m, DEFAULT_SCOPES).map_err(EngineError::from))
                .collect::<Result<Vec<_>, _>>()?,
            credentials,
        };

        for (index, manager) in snapshot.credentials.iter().enumerate() {
            if let Err(e) = manager.start().await {
                for started in &snapshot.credentials[..index] {
                    started.stop();
                }
                return Err(EngineError::Dependency(e.to_string()));
            }
        }

        Ok(snapshot)
    }

    /// Stop this snapshot's credential managers. Called on the outgoing
    /// snapshot after a reload and on shutdown.
    pub fn stop(&self) {
        for manager in &self.credentials {
            manager.stop();
        }
    }
}
