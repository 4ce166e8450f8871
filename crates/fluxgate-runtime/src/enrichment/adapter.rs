//! Enrichment source adapters
//!
//! Each configured source carries a string type tag; the tag is resolved at
//! snapshot-compile time into one variant of the closed [`Adapter`] enum, so
//! dispatch at request time is a single match and adding a new source type
//! is a compile-time-checked change. Backends the engine does not own
//! (query language, parameter store, secrets, object store, keyed storage)
//! are injected collaborator traits.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use fluxgate_core::config::HttpMethod;
use fluxgate_core::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Schema-driven query-language collaborator
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn execute(
        &self,
        params: &HashMap<String, Value>,
        headers: &HashMap<String, String>,
    ) -> Result<Value>;
}

/// Parameter-store lookup collaborator
#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Value>;
}

/// Secret lookup collaborator
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Value>;
}

/// Object lookup collaborator
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Value>;
}

/// Generic keyed-storage collaborator
#[async_trait]
pub trait KeyedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Value>;
}

/// Injected collaborator set; a source kind whose collaborator is missing is
/// rejected when the snapshot is compiled.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub query: Option<Arc<dyn QueryEngine>>,
    pub parameters: Option<Arc<dyn ParameterStore>>,
    pub secrets: Option<Arc<dyn SecretStore>>,
    pub objects: Option<Arc<dyn ObjectStore>>,
    pub storage: Option<Arc<dyn KeyedStore>>,
}

/// Closed set of adapter types, one variant per source type tag
#[derive(Clone)]
pub enum Adapter {
    /// `fixed`: returns the `value` parameter unchanged
    Fixed,
    /// `rest`: HTTP call described by `url`/`method`/`body`/`query` params
    Rest(RestAdapter),
    /// `query`: schema-query collaborator
    Query(Arc<dyn QueryEngine>),
    /// `parameter_store`: parameter lookup by `name`
    ParameterStore(Arc<dyn ParameterStore>),
    /// `secret`: secret lookup by `name`
    Secret(Arc<dyn SecretStore>),
    /// `object`: object lookup by `key`
    Object(Arc<dyn ObjectStore>),
    /// `keyed_storage`: keyed lookup by `key`
    KeyedStorage(Arc<dyn KeyedStore>),
}

impl Adapter {
    /// Resolve a type tag into an adapter. Unknown tags and missing
    /// collaborators are configuration errors.
    pub fn from_kind(kind: &str, collaborators: &Collaborators, timeout: Duration) -> Result<Self> {
        match kind {
            "fixed" => Ok(Adapter::Fixed),
            "rest" => Ok(Adapter::Rest(RestAdapter::new(timeout)?)),
            "query" => collaborators
                .query
                .clone()
                .map(Adapter::Query)
                .ok_or_else(|| anyhow!("no query engine configured")),
            "parameter_store" => collaborators
                .parameters
                .clone()
                .map(Adapter::ParameterStore)
                .ok_or_else(|| anyhow!("no parameter store configured")),
            "secret" => collaborators
                .secrets
                .clone()
                .map(Adapter::Secret)
                .ok_or_else(|| anyhow!("no secret store configured")),
            "object" => collaborators
                .objects
                .clone()
                .map(Adapter::Object)
                .ok_or_else(|| anyhow!("no object store configured")),
            "keyed_storage" => collaborators
                .storage
                .clone()
                .map(Adapter::KeyedStorage)
                .ok_or_else(|| anyhow!("no keyed storage configured")),
            other => Err(anyhow!("unknown source kind: {}", other)),
        }
    }

    /// Dispatch one call with fully resolved parameters and headers
    pub async fn call(
        &self,
        params: &HashMap<String, Value>,
        headers: &HashMap<String, String>,
    ) -> Result<Value> {
        match self {
            Adapter::Fixed => params
                .get("value")
                .cloned()
                .ok_or_else(|| anyhow!("fixed source is missing the 'value' parameter")),
            Adapter::Rest(rest) => rest.call(params, headers).await,
            Adapter::Query(engine) => engine.execute(params, headers).await,
            Adapter::ParameterStore(store) => store.get(&required_str(params, "name")?).await,
            Adapter::Secret(store) => store.get(&required_str(params, "name")?).await,
            Adapter::Object(store) => store.get(&required_str(params, "key")?).await,
            Adapter::KeyedStorage(store) => store.get(&required_str(params, "key")?).await,
        }
    }
}

fn required_str(params: &HashMap<String, Value>, key: &str) -> Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("missing string parameter '{}'", key))
}

/// HTTP REST adapter backed by a shared reqwest client
#[derive(Clone)]
pub struct RestAdapter {
    client: reqwest::Client,
}

impl RestAdapter {
    fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("failed to build HTTP client")?,
        })
    }

    async fn call(
        &self,
        params: &HashMap<String, Value>,
        headers: &HashMap<String, String>,
    ) -> Result<Value> {
        let url = required_str(params, "url")?;
        let url = append_query(&url, params)?;

        let method = match params.get("method").and_then(|v| v.as_str()) {
            None => HttpMethod::Get,
            Some(m) => serde_json::from_value(serde_json::Value::String(m.to_uppercase()))
                .map_err(|_| anyhow!("unsupported HTTP method: {}", m))?,
        };

        let mut request = match method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Put => self.client.put(&url),
            HttpMethod::Delete => self.client.delete(&url),
            HttpMethod::Patch => self.client.patch(&url),
        };

        for (name, value) in headers {
            request = request.header(name, value);
        }

        if let Some(body) = params.get("body") {
            request = request.json(&body.to_json());
        }

        tracing::debug!(%url, "calling rest enrichment source");

        let response = request.send().await.context("HTTP request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP request failed with status {}", status));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .context("failed to decode JSON response")?;

        Ok(Value::from_json(json))
    }
}

/// Append the optional `query` parameter object as an encoded query string
fn append_query(url: &str, params: &HashMap<String, Value>) -> Result<String> {
    let Some(query) = params.get("query") else {
        return Ok(url.to_string());
    };

    let Value::Object(map) = query else {
        return Err(anyhow!("'query' parameter must be an object"));
    };

    let mut parts = Vec::with_capacity(map.len());
    for (key, value) in map {
        parts.push(format!(
            "{}={}",
            urlencoding::encode(key),
            urlencoding::encode(&value.render())
        ));
    }

    if parts.is_empty() {
        return Ok(url.to_string());
    }

    let separator = if url.contains('?') { '&' } else { '?' };
    Ok(format!("{}{}{}", url, separator, parts.join("&")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result = Adapter::from_kind("bogus", &Collaborators::default(), Duration::from_secs(1));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_collaborator_is_rejected() {
        let result = Adapter::from_kind("secret", &Collaborators::default(), Duration::from_secs(1));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fixed_adapter_echoes_value() {
        let adapter =
            Adapter::from_kind("fixed", &Collaborators::default(), Duration::from_secs(1)).unwrap();

        let mut params = HashMap::new();
        params.insert("value".to_string(), Value::Number(7.0));

        let result = adapter.call(&params, &HashMap::new()).await.unwrap();
        assert_eq!(result, Value::Number(7.0));
    }

    #[tokio::test]
    async fn test_fixed_adapter_requires_value() {
        let adapter =
            Adapter::from_kind("fixed", &Collaborators::default(), Duration::from_secs(1)).unwrap();
        assert!(adapter.call(&HashMap::new(), &HashMap::new()).await.is_err());
    }

    #[test]
    fn test_append_query() {
        let mut params = HashMap::new();
        params.insert(
            "query".to_string(),
            Value::Object({
                let mut m = HashMap::new();
                m.insert("q".to_string(), Value::String("a b".to_string()));
                m
            }),
        );

        let url = append_query("http://example.com/search", &params).unwrap();
        assert_eq!(url, "http://example.com/search?q=a%20b");
    }

    #[tokio::test]
    async fn test_injected_collaborator_dispatch() {
        struct StaticSecrets;

        #[async_trait]
        impl SecretStore for StaticSecrets {
            async fn get(&self, name: &str) -> Result<Value> {
                Ok(Value::String(format!("secret:{}", name)))
            }
        }

        let collaborators = Collaborators {
            secrets: Some(Arc::new(StaticSecrets)),
            ..Default::default()
        };

        let adapter =
            Adapter::from_kind("secret", &collaborators, Duration::from_secs(1)).unwrap();

        let mut params = HashMap::new();
        params.insert("name".to_string(), Value::String("db_password".to_string()));

        let result = adapter.call(&params, &HashMap::new()).await.unwrap();
        assert_eq!(result, Value::String("secret:db_password".to_string()));
    }
}
