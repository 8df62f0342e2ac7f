//! Configuration loader for YAML files

use crate::config::types::EngineConfig;
use crate::errors::ConfigError;
use std::path::Path;
use tokio::fs;

/// Configuration loader with validation
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;

        log::debug!("Read configuration from {}", path.display());
        Self::from_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<EngineConfig, ConfigError> {
        // serde_yaml rejects an empty document; treat it as all defaults.
        let config: EngineConfig = if content.trim().is_empty() {
            EngineConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };

        config.validate()?;
        Ok(config)
    }
}
