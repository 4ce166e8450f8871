//! Fluxgate runtime
//!
//! Executes declarative service definitions: compiled expression programs
//! run against a per-request context, middlewares enrich and authenticate,
//! validation and transformation rules shape the result, and a response
//! template produces the reply. The [`engine::Engine`] ties it together and
//! supports zero-downtime configuration reloads.

pub mod context;
pub mod credentials;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod eval;
pub mod interceptor;
pub mod metrics;
pub mod provider;
pub mod response;
pub mod transform;
pub mod validation;

pub use context::ExecutionContext;
pub use credentials::{CredentialManager, TokenFetcher};
pub use engine::{Engine, EngineBuilder, EngineSnapshot, Request, Response};
pub use enrichment::{Collaborators, KeyedStore, ObjectStore, ParameterStore, QueryEngine, SecretStore};
pub use error::{EngineError, Result, RuntimeError};
pub use metrics::{CollectingSink, MetricEvent, MetricsSink, TracingSink};
pub use provider::{ConfigProvider, StaticProvider, YamlFileProvider};
