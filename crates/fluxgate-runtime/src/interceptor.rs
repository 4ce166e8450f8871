//! Downstream response forwarding
//!
//! When configured, the built response is forwarded to a downstream URL and
//! the downstream's reply replaces the local status, body and headers. The
//! forward sits on the response path on purpose: a transport failure turns
//! the whole request into a 502, because the caller must not believe a
//! delivery happened when it did not.

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::eval;
use crate::response::BuiltResponse;
use fluxgate_core::config::{HttpMethod, InterceptorConfig};
use fluxgate_core::{CompileError, Template};
use std::collections::HashMap;
use std::time::Duration;

/// Compiled downstream forward held by a snapshot
#[derive(Clone)]
pub struct Interceptor {
    url: Template,
    method: HttpMethod,
    headers: Vec<(String, Template)>,
    client: reqwest::Client,
}

impl Interceptor {
    pub fn compile(
        config: &InterceptorConfig,
        scopes: &[&str],
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let headers = config
            .headers
            .iter()
            .map(|(name, value)| Ok((name.clone(), Template::compile(value, scopes)?)))
            .collect::<Result<Vec<_>, CompileError>>()?;

        Ok(Self {
            url: Template::compile(&config.url, scopes)?,
            method: config.method,
            headers,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    /// Forward the built response body downstream and return the
    /// downstream's reply, which replaces the local response wholesale. Any
    /// transport failure maps to a gateway error.
    pub async fn forward(
        &self,
        response: &BuiltResponse,
        ctx: &ExecutionContext,
    ) -> Result<BuiltResponse, EngineError> {
        let url = eval::template_to_string(&self.url, ctx)
            .map_err(|e| EngineError::Internal(format!("interceptor url: {}", e)))?;

        let mut request = match self.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Put => self.client.put(&url),
            HttpMethod::Delete => self.client.delete(&url),
            HttpMethod::Patch => self.client.patch(&url),
        };

        // Response headers first, then configured headers on top
        for (name, value) in &response.headers {
            request = request.header(name, value);
        }
        for (name, template) in &self.headers {
            let value = eval::template_to_string(template, ctx)
                .map_err(|e| EngineError::Internal(format!("interceptor header '{}': {}", name, e)))?;
            request = request.header(name, value);
        }

        let downstream = request
            .header("content-type", "application/json")
            .body(response.body.clone())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(%url, error = %e, "downstream forward failed");
                EngineError::Gateway(format!("downstream call failed: {}", e))
            })?;

        let status = downstream.status().as_u16();
        let mut headers = HashMap::new();
        for (name, value) in downstream.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_string(), v.to_string());
            }
        }

        let body = downstream
            .bytes()
            .await
            .map_err(|e| {
                tracing::error!(%url, error = %e, "failed to read downstream reply");
                EngineError::Gateway(format!("downstream reply unreadable: {}", e))
            })?
            .to_vec();

        tracing::debug!(%url, status, "response replaced by downstream reply");

        Ok(BuiltResponse {
            status,
            body,
            headers,
        })
    }
}
