//! WebSocket messages for interactive runs.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Text sent after the last output chunk of a run that ended on its own.
pub const FINISHED_MARKER: &str = "\nExecution finished.\n";

/// Reply sent when stdin arrives while nothing is running.
pub const NOT_RUNNING_MESSAGE: &str = "[Process not running]\n";

/// A message sent by the client over the run socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Start a run, replacing any run already in progress.
    Run {
        /// Language identifier as typed by the user.
        #[serde(default, alias = "language")]
        lang: String,
        /// Program source.
        #[serde(default)]
        code: String,
    },
    /// Feed text to the running program's standard input.
    Stdin {
        #[serde(default)]
        input: String,
    },
}

impl ClientMessage {
    /// Decode a client message from socket text.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::invalid_message(e.to_string()))
    }
}

/// A message sent by the server over the run socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    /// Text to append to the client's console.
    pub output: String,
    /// Set on the terminal message of a run that finished normally.
    #[serde(default, skip_serializing_if = "is_false")]
    pub finished: bool,
    /// Exit code of the finished program, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Machine-readable failure kind, set on error messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ServerMessage {
    /// An ordinary output message.
    pub fn output(text: impl Into<String>) -> Self {
        Self {
            output: text.into(),
            finished: false,
            exit_code: None,
            error: None,
        }
    }

    /// The terminal marker for a run that ended on its own.
    pub fn finished(exit_code: Option<i32>) -> Self {
        Self {
            output: FINISHED_MARKER.to_string(),
            finished: true,
            exit_code,
            error: None,
        }
    }

    /// A failure report, rendered as a bracketed console line.
    pub fn failure(kind: impl Into<String>, message: impl AsRef<str>) -> Self {
        Self {
            output: format!("[{}]\n", message.as_ref()),
            finished: false,
            exit_code: None,
            error: Some(kind.into()),
        }
    }

    /// Compiler diagnostics, shown verbatim rather than bracketed.
    pub fn diagnostics(text: impl AsRef<str>) -> Self {
        let text = text.as_ref();
        let output = if text.ends_with('\n') {
            text.to_string()
        } else {
            format!("{}\n", text)
        };
        Self {
            output,
            finished: false,
            exit_code: None,
            error: Some("compile_failure".to_string()),
        }
    }

    /// Reply to stdin submitted with no live process.
    pub fn not_running() -> Self {
        Self {
            output: NOT_RUNNING_MESSAGE.to_string(),
            finished: false,
            exit_code: None,
            error: Some("no_active_process".to_string()),
        }
    }

    /// Serialize for the socket.
    pub fn to_json(&self) -> String {
        // A struct of strings, bools and integers always serializes.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{\"output\":\"\"}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_lang() {
        let msg = ClientMessage::parse(r#"{"action":"run","lang":"python","code":"print(1)"}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Run {
                lang: "python".to_string(),
                code: "print(1)".to_string()
            }
        );
    }

    #[test]
    fn test_parse_run_accepts_language_alias() {
        let msg = ClientMessage::parse(r#"{"action":"run","language":"c++","code":""}"#).unwrap();
        match msg {
            ClientMessage::Run { lang, .. } => assert_eq!(lang, "c++"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_stdin_defaults_to_empty_input() {
        let msg = ClientMessage::parse(r#"{"action":"stdin"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Stdin {
                input: String::new()
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_action() {
        let err = ClientMessage::parse(r#"{"action":"format","code":""}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage { .. }));
    }

    #[test]
    fn test_output_message_omits_optional_fields() {
        let json = ServerMessage::output("hi\n").to_json();
        assert_eq!(json, r#"{"output":"hi\n"}"#);
    }

    #[test]
    fn test_finished_message_is_distinguishable() {
        let value: serde_json::Value =
            serde_json::from_str(&ServerMessage::finished(Some(3)).to_json()).unwrap();
        assert_eq!(value["finished"], true);
        assert_eq!(value["exit_code"], 3);
        assert_eq!(value["output"], FINISHED_MARKER);
    }

    #[test]
    fn test_failure_message_carries_kind() {
        let msg = ServerMessage::failure("unsupported_language", "Unsupported language: cobol");
        assert_eq!(msg.output, "[Unsupported language: cobol]\n");
        assert_eq!(msg.error.as_deref(), Some("unsupported_language"));
        assert!(!msg.finished);
    }

    #[test]
    fn test_diagnostics_are_not_bracketed() {
        let msg = ServerMessage::diagnostics("Main.c:1: error: expected ';'");
        assert_eq!(msg.output, "Main.c:1: error: expected ';'\n");
        assert_eq!(msg.error.as_deref(), Some("compile_failure"));
    }
}
