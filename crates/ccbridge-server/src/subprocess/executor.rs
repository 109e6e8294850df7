//! Claude Code subprocess launcher.
//!
//! Every request gets its own `claude -p` process. The prompt is written to
//! stdin and stdin is closed before any output is read, so prompts never
//! hit argument-length limits or shell quoting. Children are killed when
//! their handle is dropped.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ccbridge_core::ndjson::{self, SessionResult};

use crate::config::BridgeConfig;

/// Upper bound on stderr text kept for failure reports.
const MAX_STDERR_CAPTURE: usize = 4096;

/// Output format requested from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// `--output-format stream-json` with partial messages, one event per line.
    StreamJson,
    /// `--output-format json`, one document on exit.
    Json,
}

/// Launches `claude` with the bridge's fixed argument set.
#[derive(Debug, Clone)]
pub struct ClaudeExecutor {
    claude_bin: PathBuf,
    allowed_tools: Vec<String>,
}

/// A running streaming process with its channels split out.
#[derive(Debug)]
pub struct StreamingProcess {
    pub child: Child,
    pub stdout: ChildStdout,
    pub stderr: StderrDrain,
}

/// Background task collecting a child's stderr.
#[derive(Debug)]
pub struct StderrDrain {
    handle: JoinHandle<String>,
}

impl ClaudeExecutor {
    pub fn new(claude_bin: impl Into<PathBuf>, allowed_tools: Vec<String>) -> Self {
        Self {
            claude_bin: claude_bin.into(),
            allowed_tools,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.claude_bin.clone(), config.allowed_tools.clone())
    }

    /// Build the command line for `mode`.
    pub fn command(&self, mode: OutputMode) -> Command {
        let mut cmd = Command::new(&self.claude_bin);
        cmd.arg("-p").arg("--output-format");
        match mode {
            OutputMode::StreamJson => {
                cmd.arg("stream-json")
                    .arg("--verbose")
                    .arg("--include-partial-messages");
            }
            OutputMode::Json => {
                cmd.arg("json");
            }
        }
        if !self.allowed_tools.is_empty() {
            cmd.arg("--allowedTools").arg(self.allowed_tools.join(","));
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Spawn a streaming process and hand the prompt to it.
    ///
    /// Any error here happens before a response is committed.
    pub async fn spawn_streaming(&self, prompt: &str) -> Result<StreamingProcess, SubprocessError> {
        let mut child = self.spawn(OutputMode::StreamJson)?;
        let pid = child.id();

        let stdin = child.stdin.take().ok_or_else(|| SubprocessError::SpawnFailed {
            reason: "Failed to capture stdin".to_string(),
        })?;
        write_prompt(stdin, prompt).await?;

        let stdout = child.stdout.take().ok_or_else(|| SubprocessError::SpawnFailed {
            reason: "Failed to capture stdout".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| SubprocessError::SpawnFailed {
            reason: "Failed to capture stderr".to_string(),
        })?;

        info!(pid = ?pid, prompt_bytes = prompt.len(), "Spawned streaming claude subprocess");
        Ok(StreamingProcess {
            child,
            stdout,
            stderr: StderrDrain::spawn(stderr, pid),
        })
    }

    /// Run a non-streaming request to completion and parse its result.
    pub async fn run_json(&self, prompt: &str) -> Result<SessionResult, SubprocessError> {
        let mut child = self.spawn(OutputMode::Json)?;
        let stdin = child.stdin.take().ok_or_else(|| SubprocessError::SpawnFailed {
            reason: "Failed to capture stdin".to_string(),
        })?;
        write_prompt(stdin, prompt).await?;

        let output = child
            .wait_with_output()
            .await
            .map_err(SubprocessError::Wait)?;
        if !output.status.success() {
            return Err(SubprocessError::CommandFailed {
                status: output.status,
                stderr: truncate_str(String::from_utf8_lossy(&output.stderr).trim(), MAX_STDERR_CAPTURE),
            });
        }

        debug!(stdout_bytes = output.stdout.len(), "claude json output received");
        ndjson::parse_result_document(&output.stdout).map_err(|e| SubprocessError::InvalidOutput {
            reason: e.to_string(),
        })
    }

    fn spawn(&self, mode: OutputMode) -> Result<Child, SubprocessError> {
        debug!(claude_bin = %self.claude_bin.display(), ?mode, "Spawning claude subprocess");
        self.command(mode)
            .spawn()
            .map_err(|e| SubprocessError::SpawnFailed {
                reason: e.to_string(),
            })
    }
}

/// Write the whole prompt and close stdin so the CLI sees EOF.
async fn write_prompt(mut stdin: ChildStdin, prompt: &str) -> Result<(), SubprocessError> {
    let to_err = |e: std::io::Error| SubprocessError::StdinFailed {
        reason: e.to_string(),
    };
    stdin.write_all(prompt.as_bytes()).await.map_err(to_err)?;
    stdin.flush().await.map_err(to_err)?;
    stdin.shutdown().await.map_err(to_err)?;
    Ok(())
}

impl StderrDrain {
    /// Start reading `stderr` concurrently with stdout consumption.
    pub fn spawn(stderr: ChildStderr, pid: Option<u32>) -> Self {
        Self {
            handle: tokio::spawn(drain_stderr(stderr, pid)),
        }
    }

    /// Wait for the drain to finish and return the captured text.
    ///
    /// Descendants of a killed child can keep the pipe open, so the wait is
    /// bounded by `timeout` and the task is aborted afterwards.
    pub async fn finish(self, timeout: Duration) -> String {
        let mut handle = self.handle;
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(error = %e, "stderr drain task failed");
                String::new()
            }
            Err(_) => {
                handle.abort();
                warn!("Timed out waiting for stderr to close");
                String::new()
            }
        }
    }
}

async fn drain_stderr(stderr: ChildStderr, pid: Option<u32>) -> String {
    let mut reader = BufReader::new(stderr);
    let mut captured = String::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let text = text.trim_end();
                debug!(pid = ?pid, "stderr: {}", text);
                if captured.len() < MAX_STDERR_CAPTURE {
                    captured.push_str(text);
                    captured.push('\n');
                }
            }
            Err(e) => {
                warn!(pid = ?pid, error = %e, "Failed to read stderr");
                break;
            }
        }
    }
    debug!(pid = ?pid, "stderr reader finished");
    truncate_str(captured.trim_end(), MAX_STDERR_CAPTURE)
}

/// Truncate to at most `max` bytes on a char boundary.
fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Errors from subprocess operations.
#[derive(Debug, thiserror::Error)]
pub enum SubprocessError {
    #[error("failed to execute claude: {reason}")]
    SpawnFailed { reason: String },

    #[error("failed to write prompt to claude: {reason}")]
    StdinFailed { reason: String },

    #[error("failed to wait for claude: {0}")]
    Wait(#[source] std::io::Error),

    #[error("claude command failed: {}", failure_detail(.status, .stderr))]
    CommandFailed { status: ExitStatus, stderr: String },

    #[error("failed to parse claude response: {reason}")]
    InvalidOutput { reason: String },
}

/// Prefer the CLI's own diagnostics over the bare exit status.
pub(crate) fn failure_detail(status: &ExitStatus, stderr: &str) -> String {
    if stderr.is_empty() {
        status.to_string()
    } else {
        stderr.to_string()
    }
}
