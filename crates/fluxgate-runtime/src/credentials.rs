//! Background-refreshing credential manager
//!
//! Caches a single token per auth middleware instance. `start` performs one
//! synchronous fetch (boot fails if it errors) and then launches a refresh
//! task that wakes shortly before the token's TTL elapses. On fetch failure
//! the task keeps retrying on a short timer while the last good token is
//! still valid; once the token actually expires, `token()` surfaces an
//! error. Reads never block on network I/O.

use crate::error::{Result, RuntimeError};
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Safety margin subtracted from a token's TTL before scheduling a refresh,
/// capped at half the TTL so short-lived tokens still get a sensible window.
const REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Delay between retries after a failed refresh
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// The seam between the refresh policy and any specific authentication
/// protocol: fetch one token and its time-to-live.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    async fn fetch(&self) -> AnyResult<(String, Duration)>;
}

#[derive(Debug)]
struct CredentialState {
    token: String,
    expires_at: Instant,
    refresh_at: Instant,
    initialized: bool,
}

/// Background-refreshing single-token cache
pub struct CredentialManager {
    name: String,
    fetcher: Arc<dyn TokenFetcher>,
    state: Arc<RwLock<CredentialState>>,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CredentialManager {
    /// Create an uninitialized manager; `token()` errors until `start` runs
    pub fn new(name: impl Into<String>, fetcher: Arc<dyn TokenFetcher>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            name: name.into(),
            fetcher,
            state: Arc::new(RwLock::new(CredentialState {
                token: String::new(),
                expires_at: Instant::now(),
                refresh_at: Instant::now(),
                initialized: false,
            })),
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Instance name, matching the auth middleware that owns this manager
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetch the first token synchronously and launch the refresh task.
    /// A fetch error here fails the whole boot (or reload).
    pub async fn start(&self) -> Result<()> {
        let (token, ttl) = self.fetcher.fetch().await.map_err(|e| {
            RuntimeError::CredentialUnavailable(format!(
                "initial fetch for '{}' failed: {}",
                self.name, e
            ))
        })?;

        Self::store(&self.state, token, ttl);
        tracing::info!(credential = %self.name, ttl_secs = ttl.as_secs(), "credential manager started");

        let state = Arc::clone(&self.state);
        let fetcher = Arc::clone(&self.fetcher);
        let name = self.name.clone();
        let mut shutdown = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                let sleep_for = {
                    let s = state.read().unwrap();
                    s.refresh_at.saturating_duration_since(Instant::now())
                };

                tokio::select! {
                    _ = tokio::time::sleep(sleep_for) => {}
                    _ = shutdown.changed() => break,
                }

                match fetcher.fetch().await {
                    Ok((token, ttl)) => {
                        Self::store(&state, token, ttl);
                        tracing::debug!(credential = %name, ttl_secs = ttl.as_secs(), "token refreshed");
                    }
                    Err(e) => {
                        tracing::warn!(credential = %name, error = %e, "token refresh failed, retrying");
                        tokio::select! {
                            _ = tokio::time::sleep(RETRY_INTERVAL) => {}
                            _ = shutdown.changed() => break,
                        }
                    }
                }
            }
            tracing::debug!(credential = %name, "refresh task stopped");
        });

        *self.handle.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn store(state: &RwLock<CredentialState>, token: String, ttl: Duration) {
        let now = Instant::now();
        let margin = REFRESH_MARGIN.min(ttl / 2);
        let mut s = state.write().unwrap();
        s.token = token;
        s.expires_at = now + ttl;
        s.refresh_at = now + ttl.saturating_sub(margin);
        s.initialized = true;
    }

    /// Return the cached token. O(1) under a read lock; errors before
    /// `start` or after the token has expired without a refresh.
    pub fn token(&self) -> Result<String> {
        let s = self.state.read().unwrap();

        if !s.initialized {
            return Err(RuntimeError::CredentialUnavailable(format!(
                "credential '{}' not started",
                self.name
            )));
        }

        if Instant::now() >= s.expires_at {
            return Err(RuntimeError::CredentialUnavailable(format!(
                "credential '{}' expired",
                self.name
            )));
        }

        Ok(s.token.clone())
    }

    /// Cancel the refresh task. Idempotent and safe to call during a reload
    /// or concurrently with an in-progress fetch.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.lock().unwrap().take() {
            drop(handle);
            tracing::debug!(credential = %self.name, "credential manager stopped");
        }
    }
}

impl Drop for CredentialManager {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
