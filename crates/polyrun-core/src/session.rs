//! Interactive run sessions.
//!
//! A session is one launch of one program. It runs as a spawned task that
//! owns the child process, the workspace and the output pipe, while the
//! caller keeps a [`SessionHandle`] for writing input and cancelling.
//!
//! The two sides share a [`SessionState`] behind a mutex. Every event the task
//! emits is sent while holding that lock and only if the session is still
//! live, and [`SessionHandle::kill`] flips the state under the same lock. So
//! once `kill` returns, the caller receives nothing more from the session,
//! however long the OS takes to actually reap the process.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::compile::compile;
use crate::config::ExecutionConfig;
use crate::errors::ExecutionError;
use crate::events::RunEvent;
use crate::process::{spawn_merged, GroupGuard};
use crate::streamer::OutputStreamer;
use crate::toolchain::{InputMode, LanguagePipeline};
use crate::workspace::Workspace;

const READ_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Compiling,
    CompileFailed,
    Running,
    Exited,
    Killed,
    Errored,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::CompileFailed
                | SessionState::Exited
                | SessionState::Killed
                | SessionState::Errored
        )
    }
}

struct SessionShared {
    id: String,
    state: Mutex<SessionState>,
    stdin: AsyncMutex<Option<ChildStdin>>,
    input_mode: InputMode,
    events: UnboundedSender<RunEvent>,
    cancel: CancellationToken,
}

impl SessionShared {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state(&self) -> SessionState {
        *self.lock_state()
    }

    /// Move between two live states. False if the session already ended.
    fn advance(&self, to: SessionState) -> bool {
        let mut state = self.lock_state();
        if state.is_terminal() {
            return false;
        }
        log::debug!("Session {}: {:?} -> {:?}", self.id, *state, to);
        *state = to;
        true
    }

    /// Send an event if the session is still live.
    fn emit(&self, event: RunEvent) -> bool {
        let state = self.lock_state();
        if state.is_terminal() {
            return false;
        }
        // A closed receiver means the caller went away; cancellation follows.
        self.events.send(event).is_ok()
    }

    /// Enter a terminal state, sending `event` as the last word.
    ///
    /// Only the first terminal transition wins; later ones are ignored.
    fn conclude(&self, to: SessionState, event: Option<RunEvent>) -> bool {
        let mut state = self.lock_state();
        if state.is_terminal() {
            return false;
        }
        log::debug!("Session {}: {:?} -> {:?}", self.id, *state, to);
        *state = to;
        if let Some(event) = event {
            let _ = self.events.send(event);
        }
        true
    }

    fn fail(&self, to: SessionState, error: &ExecutionError) -> bool {
        log::info!("Session {} failed: {}", self.id, error);
        self.conclude(to, Some(RunEvent::failed(&self.id, error)))
    }

    fn kill(&self) {
        if self.conclude(SessionState::Killed, None) {
            log::info!("Session {} killed", self.id);
        }
        self.cancel.cancel();
    }
}

/// Caller's side of a running session.
pub struct SessionHandle {
    shared: Arc<SessionShared>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// A cheap handle for writing input without holding on to the session.
    pub fn input(&self) -> SessionInput {
        SessionInput {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stop the session. No event is delivered after this returns.
    pub fn kill(&self) {
        self.shared.kill();
    }

    /// Wait for the session task to finish its teardown.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            log::error!("Session {} task failed: {}", self.shared.id, e);
        }
    }

    /// Kill, then wait for teardown.
    pub async fn terminate(self) {
        self.kill();
        self.join().await;
    }
}

/// Writes to a session's standard input.
#[derive(Clone)]
pub struct SessionInput {
    shared: Arc<SessionShared>,
}

impl SessionInput {
    /// Frame `text` per the pipeline's input mode and write it.
    ///
    /// The write waits for the program to drain its stdin, but stops as soon
    /// as the session is cancelled; input still pending then is discarded.
    /// A failed write ends the session as `Errored`.
    pub async fn send(&self, text: &str) -> Result<(), ExecutionError> {
        if self.shared.state() != SessionState::Running {
            return Err(ExecutionError::NoActiveProcess);
        }

        let framed = self.shared.input_mode.frame(text);
        let mut stdin = self.shared.stdin.lock().await;
        let Some(pipe) = stdin.as_mut() else {
            return Err(ExecutionError::NoActiveProcess);
        };

        let written = tokio::select! {
            _ = self.shared.cancel.cancelled() => {
                log::debug!("Session {}: input dropped on cancellation", self.shared.id);
                return Ok(());
            }
            written = async {
                pipe.write_all(framed.as_bytes()).await?;
                pipe.flush().await
            } => written,
        };

        if let Err(e) = written {
            *stdin = None;
            drop(stdin);
            let error = ExecutionError::Io(e.to_string());
            if self.shared.fail(SessionState::Errored, &error) {
                self.shared.cancel.cancel();
            }
            return Err(error);
        }
        Ok(())
    }
}

/// Starts interactive sessions.
pub struct RunSession;

impl RunSession {
    /// Spawn the session task for `code` and return its handle.
    ///
    /// The task emits `Started` once any compile step has passed, then output,
    /// and ends with exactly one `Finished` or `Failed` unless it is killed
    /// first. A compile failure produces only the `Failed` event.
    pub fn start(
        pipeline: LanguagePipeline,
        code: String,
        config: Arc<ExecutionConfig>,
        events: UnboundedSender<RunEvent>,
        cancel: CancellationToken,
    ) -> SessionHandle {
        let shared = Arc::new(SessionShared {
            id: Uuid::new_v4().to_string(),
            state: Mutex::new(SessionState::Created),
            stdin: AsyncMutex::new(None),
            input_mode: pipeline.input_mode,
            events,
            cancel,
        });

        log::info!("Session {} starting {} run", shared.id, pipeline.language);
        let task = tokio::spawn(drive(Arc::clone(&shared), pipeline, code, config));
        SessionHandle { shared, task }
    }
}

async fn drive(
    shared: Arc<SessionShared>,
    pipeline: LanguagePipeline,
    code: String,
    config: Arc<ExecutionConfig>,
) {
    let mut workspace = match Workspace::for_config(&config) {
        Ok(workspace) => workspace,
        Err(e) => {
            shared.fail(SessionState::Errored, &e);
            return;
        }
    };

    prepare_and_run(&shared, &pipeline, &code, &config, &workspace).await;
    if !shared.state().is_terminal() {
        // Only cancellation returns early without concluding.
        shared.kill();
    }

    // Teardown happens exactly once, whatever the outcome.
    *shared.stdin.lock().await = None;
    workspace.destroy();
    log::debug!("Session {} torn down in state {:?}", shared.id, shared.state());
}

async fn prepare_and_run(
    shared: &SessionShared,
    pipeline: &LanguagePipeline,
    code: &str,
    config: &ExecutionConfig,
    workspace: &Workspace,
) {
    if let Err(e) = workspace.write_source(pipeline, code).await {
        shared.fail(SessionState::Errored, &e);
        return;
    }

    if pipeline.needs_compile() {
        if !shared.advance(SessionState::Compiling) {
            return;
        }
        let compiled = tokio::select! {
            _ = shared.cancel.cancelled() => return,
            result = compile(pipeline, workspace.path(), config.compile_timeout()) => result,
        };
        match compiled {
            Ok(Some(result)) if !result.success => {
                shared.fail(SessionState::CompileFailed, &result.into_error());
                return;
            }
            Ok(_) => {}
            Err(e) => {
                shared.fail(SessionState::Errored, &e);
                return;
            }
        }
    }

    shared.emit(RunEvent::Started {
        session_id: shared.id.clone(),
        language: pipeline.language,
    });

    let command = pipeline.run.render(&pipeline.paths(workspace.path()));
    let process = match spawn_merged(&command, workspace.path()) {
        Ok(process) => process,
        Err(e) => {
            shared.fail(SessionState::Errored, &e);
            return;
        }
    };
    let mut guard = GroupGuard::new(process.pgid);

    *shared.stdin.lock().await = process.stdin;
    if !shared.advance(SessionState::Running) {
        // Killed while compiling or spawning; the guard reaps the group.
        return;
    }
    log::info!("Session {} running '{}'", shared.id, command);

    stream(
        shared,
        process.child,
        process.output,
        &mut guard,
        config.session_time_limit(),
    )
    .await;
}

async fn stream(
    shared: &SessionShared,
    mut child: Child,
    mut output: tokio::net::unix::pipe::Receiver,
    guard: &mut GroupGuard,
    limit: Duration,
) {
    let deadline = tokio::time::sleep(limit);
    tokio::pin!(deadline);

    let mut streamer = OutputStreamer::new();
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut exit_code = None;
    let mut exited = false;

    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => {
                // Covers connection-level cancellation too, which never went
                // through `kill`.
                shared.kill();
                guard.kill_now();
                let _ = child.wait().await;
                return;
            }
            _ = &mut deadline => {
                shared.fail(SessionState::Killed, &ExecutionError::Timeout { limit });
                guard.kill_now();
                let _ = child.wait().await;
                return;
            }
            status = child.wait(), if !exited => {
                exited = true;
                match status {
                    Ok(status) => exit_code = status.code(),
                    Err(e) => log::warn!("Session {}: wait failed: {}", shared.id, e),
                }
                // Leftover group members would keep the pipe open forever.
                guard.kill_now();
            }
            read = output.read(&mut buf) => {
                match read {
                    Ok(0) => break,
                    Ok(n) => {
                        for chunk in streamer.push(&buf[..n]) {
                            shared.emit(RunEvent::Output(chunk));
                        }
                    }
                    Err(e) => {
                        log::warn!("Session {}: output read failed: {}", shared.id, e);
                        break;
                    }
                }
            }
        }
    }

    if let Some(chunk) = streamer.finish() {
        shared.emit(RunEvent::Output(chunk));
    }

    if !exited {
        let status = tokio::select! {
            _ = shared.cancel.cancelled() => {
                shared.kill();
                guard.kill_now();
                let _ = child.wait().await;
                return;
            }
            // A program that closed its output is still bound by the limit.
            _ = &mut deadline => {
                shared.fail(SessionState::Killed, &ExecutionError::Timeout { limit });
                guard.kill_now();
                let _ = child.wait().await;
                return;
            }
            status = child.wait() => status,
        };
        match status {
            Ok(status) => exit_code = status.code(),
            Err(e) => log::warn!("Session {}: wait failed: {}", shared.id, e),
        }
        guard.kill_now();
    }

    if shared.conclude(
        SessionState::Exited,
        Some(RunEvent::Finished {
            session_id: shared.id.clone(),
            exit_code,
        }),
    ) {
        log::info!("Session {} exited with code {:?}", shared.id, exit_code);
    }
}
