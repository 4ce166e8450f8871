//! Configuration loading seam
//!
//! The engine never reads files or stores directly; it asks a
//! [`ConfigProvider`] for the current service definition at boot and on
//! every reload. [`StaticProvider`] holds a definition in memory and is the
//! natural choice for embedding and tests; [`YamlFileProvider`] re-reads a
//! YAML file each time so an external watcher can trigger reloads.

use anyhow::{Context, Result};
use fluxgate_core::config::ServiceConfig;
use std::path::PathBuf;
use std::sync::RwLock;

/// Source of the current service definition
pub trait ConfigProvider: Send + Sync {
    fn load(&self) -> Result<ServiceConfig>;
}

/// In-memory provider; `replace` stages a new definition for the next reload
pub struct StaticProvider {
    config: RwLock<ServiceConfig>,
}

impl StaticProvider {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Stage a new definition. Takes effect on the next reload, not
    /// immediately.
    pub fn replace(&self, config: ServiceConfig) {
        *self.config.write().unwrap() = config;
    }
}

impl ConfigProvider for StaticProvider {
    fn load(&self) -> Result<ServiceConfig> {
        Ok(self.config.read().unwrap().clone())
    }
}

/// Provider that re-reads a YAML file on every load
pub struct YamlFileProvider {
    path: PathBuf,
}

impl YamlFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigProvider for YamlFileProvider {
    fn load(&self) -> Result<ServiceConfig> {
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> ServiceConfig {
        serde_yaml::from_str(
            r#"
            name: echo
            output:
              body:
                result: ok
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_static_provider_replace() {
        let provider = StaticProvider::new(minimal());
        assert_eq!(provider.load().unwrap().name, "echo");

        let mut next = minimal();
        next.name = "echo-v2".to_string();
        provider.replace(next);

        assert_eq!(provider.load().unwrap().name, "echo-v2");
    }

    #[test]
    fn test_yaml_file_provider_missing_file() {
        let provider = YamlFileProvider::new("/nonexistent/service.yaml");
        assert!(provider.load().is_err());
    }
}
