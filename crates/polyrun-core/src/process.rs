//! Child process plumbing shared by the compile stage, batch runs and
//! interactive sessions.
//!
//! Every child is started in its own process group so that a kill reaches
//! anything it forked (the binary `go run` builds, a compiler's back end).

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::os::fd::OwnedFd;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::pipe;
use tokio::process::{Child, ChildStdin, Command};

use crate::errors::ExecutionError;
use crate::toolchain::ResolvedCommand;

const READ_BUFFER_SIZE: usize = 8192;

fn build_command(resolved: &ResolvedCommand, dir: &Path) -> Command {
    let mut cmd = Command::new(&resolved.program);
    cmd.args(&resolved.args)
        .current_dir(dir)
        .process_group(0)
        .kill_on_drop(true);
    cmd
}

/// A running child whose stdout and stderr share one pipe.
pub struct MergedProcess {
    pub child: Child,
    pub stdin: Option<ChildStdin>,
    pub output: pipe::Receiver,
    pub pgid: Option<u32>,
}

/// Spawn with a writable stdin and stdout+stderr merged into one ordered
/// stream.
///
/// Both descriptors are the same OS pipe, so the relative order of writes to
/// the two streams is preserved as the kernel saw it.
pub fn spawn_merged(resolved: &ResolvedCommand, dir: &Path) -> Result<MergedProcess, ExecutionError> {
    let (reader, writer) =
        os_pipe::pipe().map_err(|e| ExecutionError::launch(&resolved.program, e))?;
    let writer_clone = writer
        .try_clone()
        .map_err(|e| ExecutionError::launch(&resolved.program, e))?;

    let mut cmd = build_command(resolved, dir);
    cmd.stdin(Stdio::piped())
        .stdout(writer)
        .stderr(writer_clone);

    let mut child = cmd
        .spawn()
        .map_err(|e| ExecutionError::launch(&resolved.program, e))?;
    // The command still holds our copies of the write end; EOF only arrives
    // once they are closed.
    drop(cmd);

    let output = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))
        .map_err(|e| ExecutionError::launch(&resolved.program, e))?;
    let stdin = child.stdin.take();
    let pgid = child.id();

    log::debug!("Spawned '{}' (pid {:?})", resolved, pgid);
    Ok(MergedProcess {
        child,
        stdin,
        output,
        pgid,
    })
}

/// Spawn with stdin, stdout and stderr each on their own pipe.
pub fn spawn_piped(resolved: &ResolvedCommand, dir: &Path) -> Result<Child, ExecutionError> {
    let mut cmd = build_command(resolved, dir);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let child = cmd
        .spawn()
        .map_err(|e| ExecutionError::launch(&resolved.program, e))?;
    log::debug!("Spawned '{}' (pid {:?})", resolved, child.id());
    Ok(child)
}

/// SIGKILL every process in the group led by `pgid`.
///
/// A group that no longer exists is not an error.
pub fn kill_group(pgid: u32) {
    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => log::debug!("Killed process group {}", pgid),
        Err(Errno::ESRCH) => {}
        Err(e) => log::warn!("Failed to kill process group {}: {}", pgid, e),
    }
}

/// Kills the process group when dropped unless disarmed.
///
/// Covers the paths where a run is abandoned mid-flight: a timeout, or the
/// owning future being dropped on cancellation.
pub struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    pub fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    /// Kill the group now and disarm.
    pub fn kill_now(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        self.kill_now();
    }
}

/// Output captured from a process run to completion.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub truncated: bool,
}

impl CapturedOutput {
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Run a command to completion with separate stdout/stderr capture.
///
/// `stdin` is written concurrently with draining output and then closed.
/// Each stream keeps at most `max_output` bytes; the rest is read and
/// discarded so the child never blocks on a full pipe. If `limit` elapses the
/// whole process group is killed and `Timeout` is returned.
pub async fn run_to_completion(
    resolved: &ResolvedCommand,
    dir: &Path,
    stdin: &str,
    limit: Duration,
    max_output: usize,
) -> Result<CapturedOutput, ExecutionError> {
    let mut child = spawn_piped(resolved, dir)?;
    let mut guard = GroupGuard::new(child.id());

    let stdin_pipe = child.stdin.take();
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let input = stdin.to_string();

    let work = async {
        let feed = async move {
            let Some(mut pipe) = stdin_pipe else {
                return;
            };
            if !input.is_empty() {
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    // Broken pipe: the program exited without reading it all.
                    log::debug!("stdin write ended early: {}", e);
                }
            }
        };
        let wait = async {
            let status = child.wait().await;
            // Anything the child left behind would hold the pipes open.
            guard.kill_now();
            status
        };
        let (_, stdout, stderr, status) = tokio::join!(
            feed,
            read_capped(stdout_pipe, max_output),
            read_capped(stderr_pipe, max_output),
            wait
        );
        (status, stdout, stderr)
    };

    let outcome = tokio::time::timeout(limit, work).await;
    let (status, stdout, stderr) = match outcome {
        Ok(result) => result,
        Err(_) => {
            log::info!("'{}' exceeded {}s, killing", resolved.program, limit.as_secs());
            if let Some(pgid) = child.id() {
                kill_group(pgid);
            }
            let _ = child.start_kill();
            return Err(ExecutionError::Timeout { limit });
        }
    };

    let status = status.map_err(|e| ExecutionError::Io(e.to_string()))?;
    let (stdout, stdout_truncated) = stdout.map_err(|e| ExecutionError::Io(e.to_string()))?;
    let (stderr, stderr_truncated) = stderr.map_err(|e| ExecutionError::Io(e.to_string()))?;
    let truncated = stdout_truncated || stderr_truncated;
    if truncated {
        log::debug!("Output of '{}' truncated to {} bytes", resolved.program, max_output);
    }

    Ok(CapturedOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        truncated,
    })
}

async fn read_capped<R>(reader: Option<R>, cap: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok((Vec::new(), false));
    };
    let mut kept = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(kept.len());
        if n > room {
            truncated = true;
        }
        kept.extend_from_slice(&buf[..n.min(room)]);
    }
    Ok((kept, truncated))
}
