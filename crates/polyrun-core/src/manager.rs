//! One interactive slot per caller connection.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ExecutionConfig;
use crate::errors::ExecutionError;
use crate::events::RunEvent;
use crate::session::{RunSession, SessionHandle, SessionState};
use crate::toolchain::ToolchainRegistry;

/// Routes a connection's run requests, input and teardown to at most one
/// live [`RunSession`].
///
/// All of a connection's sessions report on the same event channel. Dropping
/// the manager cancels every session it started.
pub struct SessionManager {
    registry: Arc<ToolchainRegistry>,
    config: Arc<ExecutionConfig>,
    events: UnboundedSender<RunEvent>,
    slot: AsyncMutex<Option<SessionHandle>>,
    cancel: CancellationToken,
}

impl SessionManager {
    pub fn new(
        registry: Arc<ToolchainRegistry>,
        config: Arc<ExecutionConfig>,
        events: UnboundedSender<RunEvent>,
    ) -> Self {
        Self {
            registry,
            config,
            events,
            slot: AsyncMutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Start a run, replacing whatever is running now.
    ///
    /// The previous session is killed and fully torn down before the new one
    /// is installed, so a connection never has two live processes. An
    /// unsupported language is reported on the event channel as well as
    /// returned, and leaves the slot empty.
    pub async fn run(&self, language: &str, code: &str) -> Result<String, ExecutionError> {
        let mut slot = self.slot.lock().await;

        if let Some(previous) = slot.take() {
            log::info!("Superseding session {}", previous.id());
            previous.terminate().await;
        }

        let pipeline = match self.registry.resolve(language) {
            Ok(pipeline) => pipeline.clone(),
            Err(e) => {
                log::info!("Rejected run request: {}", e);
                let _ = self
                    .events
                    .send(RunEvent::failed(Uuid::new_v4().to_string(), &e));
                return Err(e);
            }
        };

        let handle = RunSession::start(
            pipeline,
            code.to_string(),
            Arc::clone(&self.config),
            self.events.clone(),
            self.cancel.child_token(),
        );
        let id = handle.id().to_string();
        *slot = Some(handle);
        Ok(id)
    }

    /// Write to the live session's stdin.
    pub async fn send_input(&self, text: &str) -> Result<(), ExecutionError> {
        let input = {
            let slot = self.slot.lock().await;
            match slot.as_ref() {
                Some(handle) => handle.input(),
                None => return Err(ExecutionError::NoActiveProcess),
            }
        };
        // The slot lock is released so a slow write never blocks a new run.
        input.send(text).await
    }

    /// State of the most recent session, if any.
    pub async fn active_state(&self) -> Option<SessionState> {
        self.slot.lock().await.as_ref().map(|handle| handle.state())
    }

    /// Kill any live session and wait for its workspace to be removed.
    pub async fn shutdown(&self) {
        let previous = self.slot.lock().await.take();
        if let Some(handle) = previous {
            log::debug!("Shutting down session {}", handle.id());
            handle.terminate().await;
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
