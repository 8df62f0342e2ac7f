//! The engine facade handed to transports.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use crate::batch::{BatchExecutor, BatchOutcome};
use crate::compare::{verify_translation, TranslationReport};
use crate::config::{EngineConfig, ExecutionConfig};
use crate::errors::ConfigError;
use crate::events::RunEvent;
use crate::manager::SessionManager;
use crate::toolchain::{ToolchainRegistry, ToolchainStatus};

/// Everything a transport needs to run code: the toolchain registry and the
/// execution limits. Cheap to clone and share between connections.
#[derive(Clone)]
pub struct ExecutionEngine {
    registry: Arc<ToolchainRegistry>,
    config: Arc<ExecutionConfig>,
    batch: BatchExecutor,
}

impl ExecutionEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = Arc::new(ToolchainRegistry::with_overrides(&config.toolchains)?);
        let execution = Arc::new(config.execution.clone());
        Ok(Self::from_parts(registry, execution))
    }

    pub fn from_parts(registry: Arc<ToolchainRegistry>, config: Arc<ExecutionConfig>) -> Self {
        let batch = BatchExecutor::new(Arc::clone(&registry), Arc::clone(&config));
        Self {
            registry,
            config,
            batch,
        }
    }

    pub fn registry(&self) -> &ToolchainRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn availability(&self) -> Vec<ToolchainStatus> {
        self.registry.availability()
    }

    pub async fn run_batch(&self, language: &str, code: &str, stdin: &str) -> BatchOutcome {
        self.batch.run(language, code, stdin).await
    }

    pub async fn verify_translation(
        &self,
        original: (&str, &str),
        converted: (&str, &str),
        stdin: &str,
    ) -> TranslationReport {
        verify_translation(&self.batch, original, converted, stdin).await
    }

    /// A session manager for one connection, reporting on `events`.
    pub fn connect(&self, events: UnboundedSender<RunEvent>) -> SessionManager {
        SessionManager::new(Arc::clone(&self.registry), Arc::clone(&self.config), events)
    }
}
