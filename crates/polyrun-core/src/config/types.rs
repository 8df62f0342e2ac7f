//! Configuration type definitions for the execution engine
//!
//! The configuration is layered: every field has a default, so a minimal YAML
//! document (or none at all) produces a working engine, and individual
//! limits or toolchain commands can be overridden as needed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::toolchain::{CommandTemplate, Language};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Per-language command overrides, keyed by any language alias.
    #[serde(default)]
    pub toolchains: HashMap<String, ToolchainOverride>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_compile_timeout")]
    pub compile_timeout_secs: u64,
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,
    /// Wall-clock limit for an interactive session once its program starts.
    #[serde(default = "default_session_time_limit")]
    pub session_time_limit_secs: u64,
    /// Cap on captured stdout and stderr (each) for batch runs.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// Parent directory for run workspaces; the system temp dir when unset.
    #[serde(default)]
    pub scratch_root: Option<PathBuf>,
    #[serde(default = "default_workspace_prefix")]
    pub workspace_prefix: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            compile_timeout_secs: default_compile_timeout(),
            batch_timeout_secs: default_batch_timeout(),
            session_time_limit_secs: default_session_time_limit(),
            max_output_bytes: default_max_output_bytes(),
            scratch_root: None,
            workspace_prefix: default_workspace_prefix(),
        }
    }
}

impl ExecutionConfig {
    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn session_time_limit(&self) -> Duration {
        Duration::from_secs(self.session_time_limit_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolchainOverride {
    #[serde(default)]
    pub compile: Option<CommandTemplate>,
    #[serde(default)]
    pub run: Option<CommandTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_compile_timeout() -> u64 { 10 }
fn default_batch_timeout() -> u64 { 10 }
fn default_session_time_limit() -> u64 { 300 }
fn default_max_output_bytes() -> usize { 1024 * 1024 }
fn default_workspace_prefix() -> String { "code_run_".to_string() }
fn default_log_level() -> String { "info".to_string() }

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let exec = &self.execution;
        if exec.compile_timeout_secs == 0 {
            return Err(ConfigError::Invalid("compile_timeout_secs must be greater than 0".to_string()));
        }
        if exec.batch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("batch_timeout_secs must be greater than 0".to_string()));
        }
        if exec.session_time_limit_secs == 0 {
            return Err(ConfigError::Invalid("session_time_limit_secs must be greater than 0".to_string()));
        }
        if exec.max_output_bytes == 0 {
            return Err(ConfigError::Invalid("max_output_bytes must be greater than 0".to_string()));
        }
        if exec.workspace_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("workspace_prefix cannot be empty".to_string()));
        }
        if exec.workspace_prefix.contains(std::path::MAIN_SEPARATOR) {
            return Err(ConfigError::Invalid("workspace_prefix cannot contain a path separator".to_string()));
        }

        for (key, override_) in &self.toolchains {
            if Language::from_identifier(key).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "Toolchain override for unknown language '{}'", key
                )));
            }
            for template in override_.compile.iter().chain(override_.run.iter()) {
                if template.program.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "Toolchain override for '{}' has an empty program", key
                    )));
                }
            }
        }

        Ok(())
    }
}
