//! Streaming session: one request, one subprocess, one SSE response.
//!
//! Data flow:
//! ```text
//! claude stdout → EventDecoder → StreamTranslator → SseEmitter → HTTP body
//! claude stderr → StderrDrain (failure reports only)
//! ```
//!
//! Lines are decoded, translated and delivered strictly one at a time, so
//! the client sees chunks in the order the CLI produced them. The session's
//! cancellation token fires when the response body is dropped; the child
//! is then killed and reaped and nothing more is written.

use std::fmt;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ccbridge_core::StreamTranslator;
use ccbridge_core::ndjson::Message;

use crate::emitter::{EmitError, SseEmitter};
use crate::subprocess::executor::failure_detail;
use crate::subprocess::{DecodeError, EventDecoder, StreamingProcess};

/// How long to wait for stderr to close once the child is gone.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Mid-stream failures. The client only sees the connection close.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to encode chunk: {0}")]
    Encode(#[source] ccbridge_core::Error),

    #[error("failed to wait for claude: {0}")]
    Wait(#[source] std::io::Error),

    #[error("claude exited abnormally: {}", failure_detail(.status, .stderr))]
    ProcessFailed { status: ExitStatus, stderr: String },
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The CLI exited cleanly and `[DONE]` was delivered.
    Completed,
    /// The client went away or the server is shutting down; the child was
    /// killed.
    Cancelled,
    /// The stream broke off without `[DONE]`.
    Failed(SessionError),
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed(_) => write!(f, "failed"),
        }
    }
}

/// Why the stdout pump stopped.
#[derive(Debug)]
enum PumpEnd {
    Exhausted,
    Cancelled,
    Failed(SessionError),
}

/// State owned by one streaming request.
#[derive(Debug)]
pub struct StreamSession {
    translator: StreamTranslator,
    emitter: SseEmitter,
    cancel: CancellationToken,
    max_line_bytes: usize,
}

impl StreamSession {
    pub const fn new(
        translator: StreamTranslator,
        emitter: SseEmitter,
        cancel: CancellationToken,
        max_line_bytes: usize,
    ) -> Self {
        Self {
            translator,
            emitter,
            cancel,
            max_line_bytes,
        }
    }

    /// Drive `process` to completion and reconcile its exit with the stream.
    pub async fn run(mut self, process: StreamingProcess) -> SessionOutcome {
        let StreamingProcess {
            mut child,
            stdout,
            stderr,
        } = process;
        info!(
            request_id = self.translator.id(),
            model = self.translator.model(),
            pid = ?child.id(),
            "Streaming session started"
        );

        let mut decoder = EventDecoder::new(stdout, self.max_line_bytes);
        let end = self.pump(&mut decoder).await;
        let skipped = decoder.skipped();
        drop(decoder);

        let outcome = match end {
            PumpEnd::Cancelled => {
                terminate(&mut child).await;
                stderr.finish(STDERR_DRAIN_TIMEOUT).await;
                SessionOutcome::Cancelled
            }
            PumpEnd::Failed(err) => {
                terminate(&mut child).await;
                stderr.finish(STDERR_DRAIN_TIMEOUT).await;
                SessionOutcome::Failed(err)
            }
            PumpEnd::Exhausted => {
                let status = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => None,
                    status = child.wait() => Some(status),
                };
                if status.is_none() {
                    terminate(&mut child).await;
                }
                let stderr_text = stderr.finish(STDERR_DRAIN_TIMEOUT).await;
                match status {
                    None => SessionOutcome::Cancelled,
                    Some(Err(e)) => SessionOutcome::Failed(SessionError::Wait(e)),
                    Some(Ok(status)) => self.finish(status, stderr_text).await,
                }
            }
        };

        self.log_outcome(&outcome, skipped);
        outcome
    }

    /// Decode, translate and emit until stdout ends, the client leaves, or
    /// the stream breaks.
    async fn pump<R: AsyncRead + Unpin>(&mut self, decoder: &mut EventDecoder<R>) -> PumpEnd {
        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return PumpEnd::Cancelled,
                next = decoder.next_message() => next,
            };
            let msg = match next {
                Ok(Some(msg)) => msg,
                Ok(None) => return PumpEnd::Exhausted,
                Err(e) => return PumpEnd::Failed(e.into()),
            };

            if let Message::System(init) = &msg {
                debug!(
                    request_id = self.translator.id(),
                    session_id = %init.session_id,
                    model = %init.model,
                    "claude session initialised"
                );
            }

            let Some(chunk) = self.translator.translate(&msg) else {
                continue;
            };
            match self.emitter.send_chunk(&chunk).await {
                Ok(()) => {}
                Err(EmitError::Closed) => {
                    self.cancel.cancel();
                    return PumpEnd::Cancelled;
                }
                Err(EmitError::Encode(e)) => return PumpEnd::Failed(SessionError::Encode(e)),
            }
        }
    }

    /// Classify the exit of a child whose stdout ran dry.
    async fn finish(&mut self, status: ExitStatus, stderr: String) -> SessionOutcome {
        if !status.success() {
            if self.cancel.is_cancelled() {
                return SessionOutcome::Cancelled;
            }
            return SessionOutcome::Failed(SessionError::ProcessFailed { status, stderr });
        }
        match self.emitter.send_done().await {
            Ok(()) => SessionOutcome::Completed,
            Err(EmitError::Closed) => SessionOutcome::Cancelled,
            Err(EmitError::Encode(e)) => SessionOutcome::Failed(SessionError::Encode(e)),
        }
    }

    fn log_outcome(&self, outcome: &SessionOutcome, skipped: u64) {
        let request_id = self.translator.id();
        let frames = self.emitter.frames_sent();
        match outcome {
            SessionOutcome::Completed => {
                info!(request_id, frames, skipped, %outcome, "Streaming session finished");
            }
            SessionOutcome::Cancelled => {
                info!(request_id, frames, %outcome, "Streaming session cancelled");
            }
            SessionOutcome::Failed(err) => {
                error!(request_id, frames, skipped, error = %err, %outcome, "Streaming session failed");
            }
        }
    }
}

/// Kill and reap the child.
async fn terminate(child: &mut Child) {
    let pid = child.id();
    match child.kill().await {
        Ok(()) => debug!(pid = ?pid, "claude subprocess killed"),
        Err(e) => warn!(pid = ?pid, error = %e, "Failed to kill claude subprocess"),
    }
}
