//! Error types for the execution engine
//!
//! Every way a run can fail is a variant of [`ExecutionError`]. Callers never
//! see these as faults: the session and batch layers turn each one into a
//! user-displayable message, and [`ExecutionError::kind`] gives the client a
//! stable tag to branch on. A program that runs and exits non-zero is not an
//! error at all; it is reported as normal output plus its exit status.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("Compilation failed with exit code {exit_code:?}: {diagnostics}")]
    CompileFailure {
        diagnostics: String,
        exit_code: Option<i32>,
    },
    #[error("Failed to launch '{program}': {reason}")]
    LaunchFailure { program: String, reason: String },
    #[error("Execution timed out after {}s", limit.as_secs())]
    Timeout { limit: Duration },
    #[error("Failed to send input: {0}")]
    Io(String),
    #[error("Process not running")]
    NoActiveProcess,
    #[error("Workspace error: {0}")]
    Workspace(String),
}

impl ExecutionError {
    /// Stable machine-readable tag for this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::UnsupportedLanguage(_) => "unsupported_language",
            ExecutionError::CompileFailure { .. } => "compile_failure",
            ExecutionError::LaunchFailure { .. } => "launch_failure",
            ExecutionError::Timeout { .. } => "timeout",
            ExecutionError::Io(_) => "io_failure",
            ExecutionError::NoActiveProcess => "no_active_process",
            ExecutionError::Workspace(_) => "workspace_error",
        }
    }

    /// Text shown to the user in the console.
    ///
    /// Compiler diagnostics are surfaced verbatim; everything else is the
    /// error's display form.
    pub fn user_message(&self) -> String {
        match self {
            ExecutionError::CompileFailure { diagnostics, .. } => diagnostics.clone(),
            other => other.to_string(),
        }
    }

    pub(crate) fn launch(program: impl Into<String>, err: std::io::Error) -> Self {
        ExecutionError::LaunchFailure {
            program: program.into(),
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        ExecutionError::Workspace(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Configuration error: {0}")]
    Invalid(String),
}
