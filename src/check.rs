//! Read-only diagnostic commands requested by the model with `[[CHECK: ...]]`.
//!
//! A check runs through `sh -c` in its own process group with a hard
//! timeout. Stdout and stderr are read through bounded buffers while the
//! command runs, then truncated to their character limits and concatenated;
//! an empty result becomes `"(No output)"`. On timeout the whole group is
//! killed and whatever was captured so far is kept, followed by the timeout
//! notice. Failures never propagate: they become the output string so the
//! model can react to them on the next turn.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::AgentConfig;
use crate::error::CheckError;
use crate::models::ToolInvocation;

pub const NO_OUTPUT: &str = "(No output)";

const READ_CHUNK_SIZE: usize = 4096;
/// Upper bound on the wait for pipe readers once the command has ended.
const IO_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
/// Widest UTF-8 encoding of one character.
const MAX_CHAR_BYTES: usize = 4;

#[async_trait]
pub trait CheckRunner: Send + Sync {
    async fn run(&self, command: &str) -> ToolInvocation;
}

#[derive(Debug, Clone)]
pub struct ShellCheckRunner {
    timeout: Duration,
    stdout_limit: usize,
    stderr_limit: usize,
}

/// What a finished (or killed) check produced.
#[derive(Debug)]
struct CheckOutput {
    text: String,
    exit_code: Option<i32>,
    timed_out: bool,
}

impl ShellCheckRunner {
    pub fn new(timeout: Duration, stdout_limit: usize, stderr_limit: usize) -> Self {
        Self {
            timeout,
            stdout_limit,
            stderr_limit,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            Duration::from_secs(config.check_timeout_secs),
            config.stdout_limit,
            config.stderr_limit,
        )
    }

    async fn execute(&self, command: &str) -> Result<CheckOutput, CheckError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| CheckError::Spawn {
            reason: e.to_string(),
        })?;

        let stdout = child.stdout.take().ok_or_else(|| CheckError::Spawn {
            reason: "stdout pipe was not available".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| CheckError::Spawn {
            reason: "stderr pipe was not available".to_string(),
        })?;

        let mut stdout_task = tokio::spawn(read_capped(
            stdout,
            self.stdout_limit.saturating_mul(MAX_CHAR_BYTES),
        ));
        let mut stderr_task = tokio::spawn(read_capped(
            stderr,
            self.stderr_limit.saturating_mul(MAX_CHAR_BYTES),
        ));

        let (exit_code, timed_out) = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => {
                let status = status.map_err(|e| CheckError::Spawn {
                    reason: e.to_string(),
                })?;
                (status.code(), false)
            }
            Err(_) => {
                kill_process_group(&child);
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "check already exited");
                }
                (None, true)
            }
        };

        let stdout = join_capped(&mut stdout_task).await;
        let stderr = join_capped(&mut stderr_task).await;

        let stdout = String::from_utf8_lossy(&stdout);
        let stderr = String::from_utf8_lossy(&stderr);
        let mut text = truncate_chars(&stdout, self.stdout_limit).to_string();
        text.push_str(truncate_chars(&stderr, self.stderr_limit));

        Ok(CheckOutput {
            text,
            exit_code,
            timed_out,
        })
    }
}

#[async_trait]
impl CheckRunner for ShellCheckRunner {
    async fn run(&self, command: &str) -> ToolInvocation {
        debug!(command = %command, "running check");

        let (output, exit_status) = match self.execute(command).await {
            Ok(out) if out.timed_out => {
                warn!(command = %command, "check timed out");
                let notice = format!(
                    "Error: {}",
                    CheckError::Timeout {
                        secs: self.timeout.as_secs()
                    }
                );
                (append_notice(out.text, &notice), None)
            }
            Ok(out) if out.text.trim().is_empty() => (NO_OUTPUT.to_string(), out.exit_code),
            Ok(out) => (out.text, out.exit_code),
            Err(e) => {
                warn!(command = %command, error = %e, "check failed to run");
                (e.to_string(), None)
            }
        };

        ToolInvocation {
            command: command.to_string(),
            output,
            exit_status,
        }
    }
}

/// Partial output followed by `notice` on its own line.
fn append_notice(mut text: String, notice: &str) -> String {
    if text.trim().is_empty() {
        return notice.to_string();
    }
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(notice);
    text
}

/// Read `reader` to EOF, keeping at most `cap` bytes.
///
/// Bytes past the cap are discarded but still read, so the writer never
/// blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(cap.min(READ_CHUNK_SIZE));
    let mut tmp = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut tmp).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(buf.len());
        buf.extend_from_slice(&tmp[..n.min(room)]);
    }
    Ok(buf)
}

/// Collect a reader task, giving up if a leftover process keeps the pipe open.
async fn join_capped(handle: &mut JoinHandle<std::io::Result<Vec<u8>>>) -> Vec<u8> {
    match tokio::time::timeout(IO_DRAIN_TIMEOUT, &mut *handle).await {
        Ok(Ok(Ok(buf))) => buf,
        Ok(Ok(Err(e))) => {
            debug!(error = %e, "check output read failed");
            Vec::new()
        }
        Ok(Err(e)) => {
            debug!(error = %e, "check output reader panicked");
            Vec::new()
        }
        Err(_) => {
            handle.abort();
            Vec::new()
        }
    }
}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Some(pid) = child.id() else {
        return;
    };
    // The child leads its own group, so its pid is the group id.
    let result = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if result == -1 {
        debug!(error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_: &Child) {}

/// The first `max_chars` characters of `s`.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
