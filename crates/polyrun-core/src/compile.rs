//! The optional compile stage that runs before a program is launched.

use std::path::Path;
use std::time::Duration;

use crate::errors::ExecutionError;
use crate::process::run_to_completion;
use crate::toolchain::LanguagePipeline;

/// Diagnostics are small; anything beyond this is compiler noise.
const MAX_DIAGNOSTIC_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResult {
    pub success: bool,
    /// Compiler stderr, or stdout when stderr was empty. Trimmed.
    pub diagnostics: String,
    pub exit_code: Option<i32>,
    /// Program that was run, for messages when there are no diagnostics.
    pub compiler: String,
}

impl CompileResult {
    /// What the user sees for a failed compile.
    pub fn message(&self) -> String {
        if self.diagnostics.is_empty() {
            format!("[{} failed]", self.compiler)
        } else {
            self.diagnostics.clone()
        }
    }

    pub fn into_error(self) -> ExecutionError {
        ExecutionError::CompileFailure {
            diagnostics: self.message(),
            exit_code: self.exit_code,
        }
    }
}

/// Compile the source already written in `dir`.
///
/// Returns `Ok(None)` for pipelines without a compile step. A compiler that
/// runs and rejects the source is `Ok(Some(result))` with `success == false`;
/// `Err` is reserved for the compiler not starting or overrunning `limit`.
pub async fn compile(
    pipeline: &LanguagePipeline,
    dir: &Path,
    limit: Duration,
) -> Result<Option<CompileResult>, ExecutionError> {
    let Some(template) = &pipeline.compile else {
        return Ok(None);
    };
    let command = template.render(&pipeline.paths(dir));
    log::debug!("Compiling {} with '{}'", pipeline.language, command);

    let captured = run_to_completion(&command, dir, "", limit, MAX_DIAGNOSTIC_BYTES).await?;

    let stderr = captured.stderr.trim();
    let diagnostics = if stderr.is_empty() {
        captured.stdout.trim()
    } else {
        stderr
    };

    let result = CompileResult {
        success: captured.status.success(),
        diagnostics: diagnostics.to_string(),
        exit_code: captured.exit_code(),
        compiler: command.program.clone(),
    };
    if !result.success {
        log::debug!(
            "{} compile failed with exit code {:?}",
            pipeline.language,
            result.exit_code
        );
    }
    Ok(Some(result))
}
