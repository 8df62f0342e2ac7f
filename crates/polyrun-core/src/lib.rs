//! Multi-language code execution engine.
//!
//! Takes user-submitted source text and a language name, compiles it if the
//! language needs it, runs it as a child process in a throwaway directory,
//! and reports what it prints. Two ways of running are provided:
//!
//! - **Interactive**: a [`SessionManager`] per caller connection starts
//!   [`RunSession`]s that stream merged stdout/stderr as [`RunEvent`]s while
//!   accepting stdin, and kill the program on a new run or disconnect.
//! - **Batch**: [`BatchExecutor`] runs to completion with all stdin supplied
//!   up front and returns a single displayable [`BatchOutcome`].
//!
//! Both share one [`ToolchainRegistry`], which maps language aliases to
//! compile and run commands, and one [`Workspace`] discipline: a fresh
//! directory per run, removed whatever the outcome.
//!
//! Programs run with the privileges of the host process. This is process
//! lifecycle management, not a sandbox.
//!
//! [`ExecutionEngine`] bundles the pieces behind one explicitly constructed
//! value built from an [`EngineConfig`].

pub mod batch;
pub mod compare;
pub mod compile;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod manager;
pub mod process;
pub mod session;
pub mod streamer;
pub mod toolchain;
pub mod workspace;

pub use batch::{BatchExecutor, BatchOutcome, BatchStatus};
pub use compare::{compare_outputs, verify_translation, TranslationReport};
pub use compile::CompileResult;
pub use config::*;
pub use engine::ExecutionEngine;
pub use errors::{ConfigError, ExecutionError};
pub use events::{OutputChunk, RunEvent};
pub use manager::SessionManager;
pub use session::{RunSession, SessionHandle, SessionInput, SessionState};
pub use toolchain::{Language, LanguagePipeline, ToolchainRegistry, ToolchainStatus};
pub use workspace::Workspace;
