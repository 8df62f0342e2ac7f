//! The interactive run socket.
//!
//! Each connection gets its own [`SessionManager`]. Receiving client messages
//! and writing server messages run concurrently, so program output keeps
//! flowing while the client types input. Input is queued and written by its
//! own task in arrival order, so a program that stops reading stdin never
//! stalls the receive loop.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use polyrun_core::{ExecutionEngine, ExecutionError, RunEvent, SessionManager};
use polyrun_types::{ClientMessage, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Render a session event for the client console.
pub fn event_to_message(event: &RunEvent) -> ServerMessage {
    match event {
        RunEvent::Started { language, .. } => {
            ServerMessage::output(format!("▶ Running {} code...\n", language))
        }
        RunEvent::Output(chunk) => ServerMessage::output(chunk.text.clone()),
        RunEvent::Finished { exit_code, .. } => ServerMessage::finished(*exit_code),
        RunEvent::Failed { kind, message, .. } if *kind == "compile_failure" => {
            ServerMessage::diagnostics(message)
        }
        RunEvent::Failed { kind, message, .. } => ServerMessage::failure(*kind, message),
    }
}

/// Act on one client message. Returns a direct reply when there is one;
/// everything else reaches the client as session events.
///
/// Input is only queued here; [`pump_input`] delivers it.
pub async fn dispatch(
    manager: &SessionManager,
    inputs: &UnboundedSender<String>,
    text: &str,
) -> Option<ServerMessage> {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            log::debug!("Rejected client message: {}", e);
            return Some(ServerMessage::failure("invalid_message", e.to_string()));
        }
    };

    match message {
        ClientMessage::Run { lang, code } => {
            if let Err(e) = manager.run(&lang, &code).await {
                log::debug!("Run request not started: {}", e);
            }
            None
        }
        ClientMessage::Stdin { input } => {
            if inputs.send(input).is_err() {
                log::debug!("Input queue closed, dropping input");
            }
            None
        }
    }
}

/// Write one piece of input to the live session.
pub async fn deliver_input(manager: &SessionManager, input: &str) -> Option<ServerMessage> {
    match manager.send_input(input).await {
        Ok(()) => None,
        Err(ExecutionError::NoActiveProcess) => Some(ServerMessage::not_running()),
        Err(e) => {
            log::debug!("Input not delivered: {}", e);
            None
        }
    }
}

/// Drain queued input in order until the queue closes.
pub async fn pump_input(
    manager: Arc<SessionManager>,
    mut inputs: UnboundedReceiver<String>,
    replies: UnboundedSender<ServerMessage>,
) {
    while let Some(input) = inputs.recv().await {
        if let Some(reply) = deliver_input(&manager, &input).await {
            let _ = replies.send(reply);
        }
    }
}

/// Serve one upgraded socket until the client goes away.
pub async fn handle_socket(socket: WebSocket, engine: ExecutionEngine) {
    let connection_id = uuid::Uuid::new_v4();
    log::info!("Run socket {} connected", connection_id);

    let (mut sink, mut stream) = socket.split();
    let (events_tx, mut events_rx) = unbounded_channel::<RunEvent>();
    let (replies_tx, mut replies_rx) = unbounded_channel::<ServerMessage>();
    let (inputs_tx, inputs_rx) = unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                Some(event) = events_rx.recv() => event_to_message(&event),
                Some(reply) = replies_rx.recv() => reply,
                else => break,
            };
            if let Err(e) = sink.send(Message::Text(message.to_json().into())).await {
                log::debug!("Run socket {} write failed: {}", connection_id, e);
                break;
            }
        }
    });

    let manager = Arc::new(engine.connect(events_tx));
    let input_task = tokio::spawn(pump_input(Arc::clone(&manager), inputs_rx, replies_tx.clone()));

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if let Some(reply) = dispatch(&manager, &inputs_tx, text.as_str()).await {
                    let _ = replies_tx.send(reply);
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("Run socket {} read failed: {}", connection_id, e);
                break;
            }
        }
    }

    // Killing the session releases any write the input task is blocked on.
    manager.shutdown().await;
    drop(inputs_tx);
    input_task.abort();
    writer.abort();
    log::info!("Run socket {} disconnected", connection_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyrun_core::config::{EngineConfig, ToolchainOverride};
    use polyrun_core::toolchain::{CommandTemplate, Language};
    use polyrun_core::{OutputChunk, SessionState};
    use polyrun_types::{FINISHED_MARKER, NOT_RUNNING_MESSAGE};
    use std::time::Duration;

    fn shell_manager() -> (SessionManager, UnboundedReceiver<RunEvent>) {
        let mut config = EngineConfig::default();
        config.toolchains.insert(
            "python".to_string(),
            ToolchainOverride {
                compile: None,
                run: Some(CommandTemplate::new("sh", &["{source}"])),
            },
        );
        let engine = ExecutionEngine::new(&config).unwrap();
        let (tx, rx) = unbounded_channel();
        (engine.connect(tx), rx)
    }

    async fn next_message(rx: &mut UnboundedReceiver<RunEvent>) -> ServerMessage {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        event_to_message(&event)
    }

    #[test]
    fn test_event_rendering() {
        let started = event_to_message(&RunEvent::Started {
            session_id: "s".into(),
            language: Language::Cpp,
        });
        assert_eq!(started.output, "▶ Running c++ code...\n");

        let chunk = event_to_message(&RunEvent::Output(OutputChunk {
            seq: 0,
            text: "42\n".into(),
        }));
        assert_eq!(chunk, ServerMessage::output("42\n"));

        let finished = event_to_message(&RunEvent::Finished {
            session_id: "s".into(),
            exit_code: Some(0),
        });
        assert!(finished.finished);
        assert_eq!(finished.output, FINISHED_MARKER);

        let failed = event_to_message(&RunEvent::Failed {
            session_id: "s".into(),
            kind: "timeout",
            message: "Execution timed out after 300s".into(),
        });
        assert_eq!(failed.output, "[Execution timed out after 300s]\n");
        assert_eq!(failed.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_compile_failure_is_shown_verbatim() {
        let msg = event_to_message(&RunEvent::Failed {
            session_id: "s".into(),
            kind: "compile_failure",
            message: "Main.java:3: error: ';' expected".into(),
        });
        assert_eq!(msg.output, "Main.java:3: error: ';' expected\n");
    }

    #[tokio::test]
    async fn test_malformed_message() {
        let (manager, _rx) = shell_manager();
        let (inputs, _queued) = unbounded_channel();
        let reply = dispatch(&manager, &inputs, "{not json").await.unwrap();
        assert_eq!(reply.error.as_deref(), Some("invalid_message"));
        assert!(reply.output.starts_with("[Invalid message: "));
    }

    #[tokio::test]
    async fn test_stdin_without_process() {
        let (manager, _rx) = shell_manager();
        let (inputs, mut queued) = unbounded_channel();
        let reply = dispatch(&manager, &inputs, r#"{"action":"stdin","input":"x"}"#).await;
        assert!(reply.is_none());
        assert_eq!(queued.recv().await.as_deref(), Some("x"));

        let reply = deliver_input(&manager, "x").await.unwrap();
        assert_eq!(reply.output, NOT_RUNNING_MESSAGE);
        assert_eq!(reply.error.as_deref(), Some("no_active_process"));
    }

    #[tokio::test]
    async fn test_pending_input_does_not_block_next_run() {
        let (manager, mut rx) = shell_manager();
        let manager = Arc::new(manager);
        let (inputs, inputs_rx) = unbounded_channel();
        let (replies, _replies_rx) = unbounded_channel();
        let pump = tokio::spawn(pump_input(Arc::clone(&manager), inputs_rx, replies));

        dispatch(&manager, &inputs, r#"{"action":"run","lang":"python","code":"sleep 30"}"#).await;
        assert_eq!(next_message(&mut rx).await.output, "▶ Running python code...\n");
        tokio::time::timeout(Duration::from_secs(10), async {
            while manager.active_state().await != Some(SessionState::Running) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        // Far more than a pipe buffer, to a program that never reads it.
        let big = serde_json::json!({"action": "stdin", "input": "x".repeat(1 << 20)});
        let reply = tokio::time::timeout(
            Duration::from_secs(3),
            dispatch(&manager, &inputs, &big.to_string()),
        )
        .await
        .unwrap();
        assert!(reply.is_none());
        tokio::time::sleep(Duration::from_millis(100)).await;

        tokio::time::timeout(
            Duration::from_secs(3),
            dispatch(&manager, &inputs, r#"{"action":"run","lang":"python","code":"echo next"}"#),
        )
        .await
        .unwrap();
        assert_eq!(next_message(&mut rx).await.output, "▶ Running python code...\n");
        assert_eq!(next_message(&mut rx).await.output, "next\n");
        assert!(next_message(&mut rx).await.finished);

        manager.shutdown().await;
        drop(inputs);
        tokio::time::timeout(Duration::from_secs(10), pump)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_language_is_reported_as_event() {
        let (manager, mut rx) = shell_manager();
        let (inputs, _queued) = unbounded_channel();
        let reply = dispatch(&manager, &inputs, r#"{"action":"run","lang":"cobol","code":""}"#).await;
        assert!(reply.is_none());
        let msg = next_message(&mut rx).await;
        assert_eq!(msg.output, "[Unsupported language: cobol]\n");
        assert_eq!(msg.error.as_deref(), Some("unsupported_language"));
    }

    #[tokio::test]
    async fn test_run_then_finish() {
        let (manager, mut rx) = shell_manager();
        let (inputs, _queued) = unbounded_channel();
        let reply = dispatch(&manager, &inputs, r#"{"action":"run","lang":"python","code":"echo hi"}"#).await;
        assert!(reply.is_none());

        assert_eq!(next_message(&mut rx).await.output, "▶ Running python code...\n");
        assert_eq!(next_message(&mut rx).await.output, "hi\n");
        let last = next_message(&mut rx).await;
        assert!(last.finished);
        assert_eq!(last.exit_code, Some(0));
        manager.shutdown().await;
    }
}
