//! Run-to-completion execution with all stdin supplied up front.

use serde::Serialize;
use std::sync::Arc;

use crate::compile::compile;
use crate::config::ExecutionConfig;
use crate::errors::ExecutionError;
use crate::process::{run_to_completion, CapturedOutput};
use crate::toolchain::{LanguagePipeline, ToolchainRegistry};
use crate::workspace::Workspace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    Completed { exit_code: Option<i32> },
    CompileFailed { exit_code: Option<i32> },
    TimedOut,
    Unsupported,
    LaunchFailed,
    Errored,
}

/// Result of a batch run.
///
/// `output` is always displayable text; failures are rendered into it rather
/// than returned as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub success: bool,
    pub output: String,
    pub status: BatchStatus,
}

impl BatchOutcome {
    fn completed(captured: &CapturedOutput) -> Self {
        let exit_code = captured.exit_code();
        let stdout = captured.stdout.trim();
        let stderr = captured.stderr.trim();

        let (success, output) = if captured.status.success() {
            let output = if stdout.is_empty() { "[No output]" } else { stdout };
            (true, output.to_string())
        } else if !stderr.is_empty() {
            (false, stderr.to_string())
        } else if !stdout.is_empty() {
            (false, stdout.to_string())
        } else {
            let code = exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string());
            (false, format!("[Non-zero exit code: {}]", code))
        };

        Self {
            success,
            output,
            status: BatchStatus::Completed { exit_code },
        }
    }

    fn from_error(error: &ExecutionError) -> Self {
        let (output, status) = match error {
            ExecutionError::UnsupportedLanguage(id) => {
                (format!("[Unsupported language: {}]", id), BatchStatus::Unsupported)
            }
            ExecutionError::Timeout { .. } => {
                ("[Execution timed out]".to_string(), BatchStatus::TimedOut)
            }
            ExecutionError::CompileFailure {
                diagnostics,
                exit_code,
            } => (
                diagnostics.clone(),
                BatchStatus::CompileFailed {
                    exit_code: *exit_code,
                },
            ),
            ExecutionError::LaunchFailure { .. } => (
                format!("[Execution error: {}]", error),
                BatchStatus::LaunchFailed,
            ),
            other => (format!("[Execution error: {}]", other), BatchStatus::Errored),
        };
        Self {
            success: false,
            output,
            status,
        }
    }
}

/// Runs programs to completion under fixed time and output limits.
#[derive(Clone)]
pub struct BatchExecutor {
    registry: Arc<ToolchainRegistry>,
    config: Arc<ExecutionConfig>,
}

impl BatchExecutor {
    pub fn new(registry: Arc<ToolchainRegistry>, config: Arc<ExecutionConfig>) -> Self {
        Self { registry, config }
    }

    /// Compile (if needed) and run `code`, feeding it `stdin`.
    ///
    /// Never fails: every outcome, including an unknown language, becomes a
    /// [`BatchOutcome`]. The workspace is gone by the time this returns.
    pub async fn run(&self, language: &str, code: &str, stdin: &str) -> BatchOutcome {
        let pipeline = match self.registry.resolve(language) {
            Ok(pipeline) => pipeline,
            Err(e) => return BatchOutcome::from_error(&e),
        };

        let mut workspace = match Workspace::for_config(&self.config) {
            Ok(workspace) => workspace,
            Err(e) => return BatchOutcome::from_error(&e),
        };

        let outcome = match self.execute(pipeline, &workspace, code, stdin).await {
            Ok(captured) => BatchOutcome::completed(&captured),
            Err(e) => BatchOutcome::from_error(&e),
        };
        workspace.destroy();

        log::info!(
            "Batch {} run finished: {:?}",
            pipeline.language,
            outcome.status
        );
        outcome
    }

    async fn execute(
        &self,
        pipeline: &LanguagePipeline,
        workspace: &Workspace,
        code: &str,
        stdin: &str,
    ) -> Result<CapturedOutput, ExecutionError> {
        workspace.write_source(pipeline, code).await?;

        if let Some(result) = compile(pipeline, workspace.path(), self.config.compile_timeout()).await? {
            if !result.success {
                return Err(result.into_error());
            }
        }

        let command = pipeline.run.render(&pipeline.paths(workspace.path()));
        run_to_completion(
            &command,
            workspace.path(),
            stdin,
            self.config.batch_timeout(),
            self.config.max_output_bytes,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn captured(code: i32, stdout: &str, stderr: &str) -> CapturedOutput {
        CapturedOutput {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            truncated: false,
        }
    }

    #[test]
    fn test_success_is_trimmed_stdout() {
        let outcome = BatchOutcome::completed(&captured(0, "  hello\n", "warning\n"));
        assert!(outcome.success);
        assert_eq!(outcome.output, "hello");
        assert_eq!(outcome.status, BatchStatus::Completed { exit_code: Some(0) });
    }

    #[test]
    fn test_success_without_output() {
        let outcome = BatchOutcome::completed(&captured(0, "\n", ""));
        assert_eq!(outcome.output, "[No output]");
    }

    #[test]
    fn test_failure_prefers_stderr() {
        let outcome = BatchOutcome::completed(&captured(1, "partial", "Traceback\n"));
        assert!(!outcome.success);
        assert_eq!(outcome.output, "Traceback");
    }

    #[test]
    fn test_failure_falls_back_to_stdout_then_code() {
        assert_eq!(BatchOutcome::completed(&captured(2, "out\n", "")).output, "out");
        assert_eq!(
            BatchOutcome::completed(&captured(7, "", "")).output,
            "[Non-zero exit code: 7]"
        );
    }

    #[test]
    fn test_error_rendering() {
        let unsupported = BatchOutcome::from_error(&ExecutionError::UnsupportedLanguage("cobol".into()));
        assert_eq!(unsupported.output, "[Unsupported language: cobol]");
        assert_eq!(unsupported.status, BatchStatus::Unsupported);

        let timeout = BatchOutcome::from_error(&ExecutionError::Timeout {
            limit: std::time::Duration::from_secs(10),
        });
        assert_eq!(timeout.output, "[Execution timed out]");
        assert_eq!(timeout.status, BatchStatus::TimedOut);

        let launch = BatchOutcome::from_error(&ExecutionError::LaunchFailure {
            program: "node".into(),
            reason: "No such file or directory".into(),
        });
        assert!(launch.output.starts_with("[Execution error: "));
        assert_eq!(launch.status, BatchStatus::LaunchFailed);
    }

    #[tokio::test]
    async fn test_unsupported_language_touches_nothing() {
        let root = tempfile::tempdir().unwrap();
        let config = ExecutionConfig {
            scratch_root: Some(root.path().to_path_buf()),
            ..ExecutionConfig::default()
        };
        let executor = BatchExecutor::new(Arc::new(ToolchainRegistry::new()), Arc::new(config));
        let outcome = executor.run("cobol", "DISPLAY 'hi'.", "").await;
        assert_eq!(outcome.status, BatchStatus::Unsupported);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
