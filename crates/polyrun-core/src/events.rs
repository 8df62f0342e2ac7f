//! What an interactive session reports to its caller.

use crate::errors::ExecutionError;
use crate::toolchain::Language;

/// One ordered piece of program output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    /// Position of this chunk within its session, starting at 0.
    pub seq: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// Any compile step passed and the program is being launched.
    Started {
        session_id: String,
        language: Language,
    },
    Output(OutputChunk),
    /// The program exited on its own. Always the last event of such a run.
    Finished {
        session_id: String,
        exit_code: Option<i32>,
    },
    /// The run ended without the program exiting normally.
    Failed {
        session_id: String,
        kind: &'static str,
        message: String,
    },
}

impl RunEvent {
    pub fn failed(session_id: impl Into<String>, error: &ExecutionError) -> Self {
        RunEvent::Failed {
            session_id: session_id.into(),
            kind: error.kind(),
            message: error.user_message(),
        }
    }

    /// True for events after which a session emits nothing more.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEvent::Finished { .. } | RunEvent::Failed { .. })
    }
}
