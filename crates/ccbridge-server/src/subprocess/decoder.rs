//! Bounded NDJSON decoding of the CLI's stdout.
//!
//! Lines are read incrementally and capped at a configurable length. A line
//! that does not decode is skipped; only channel errors and oversized lines
//! end the stream.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

use ccbridge_core::ndjson::{self, Message};

/// Default ceiling for a single stdout line (1 MiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// How much of a skipped line is echoed into debug logs.
const SKIPPED_LINE_PREVIEW: usize = 200;

/// Fatal decoder errors.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("stdout line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("failed to read stdout: {0}")]
    Io(#[from] std::io::Error),
}

/// Newline splitter with a per-line size ceiling.
#[derive(Debug)]
pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    max_len: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R, max_len: usize) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
            max_len,
        }
    }

    /// Read the next line without its terminator (`\n` or `\r\n`).
    ///
    /// A final line without a trailing newline is still returned.
    /// Returns `Ok(None)` at end of stream.
    pub async fn next_line(&mut self) -> Result<Option<&[u8]>, DecodeError> {
        self.buf.clear();
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                break;
            }

            let newline = available.iter().position(|&b| b == b'\n');
            let (content, consumed) = match newline {
                Some(pos) => (&available[..pos], pos + 1),
                None => (available, available.len()),
            };
            if self.buf.len() + content.len() > self.max_len {
                return Err(DecodeError::LineTooLong {
                    limit: self.max_len,
                });
            }
            self.buf.extend_from_slice(content);
            self.reader.consume(consumed);

            if newline.is_some() {
                break;
            }
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        Ok(Some(&self.buf))
    }
}

/// Yields decoded messages, silently skipping blank and undecodable lines.
#[derive(Debug)]
pub struct EventDecoder<R> {
    lines: LineReader<R>,
    skipped: u64,
}

impl<R: AsyncRead + Unpin> EventDecoder<R> {
    pub fn new(inner: R, max_line_bytes: usize) -> Self {
        Self {
            lines: LineReader::new(inner, max_line_bytes),
            skipped: 0,
        }
    }

    /// Next decodable message, or `Ok(None)` once stdout is exhausted.
    pub async fn next_message(&mut self) -> Result<Option<Message>, DecodeError> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            if line.trim_ascii().is_empty() {
                continue;
            }
            match ndjson::parse_bytes(line) {
                Ok(msg) => return Ok(Some(msg)),
                Err(e) => {
                    self.skipped += 1;
                    let preview = String::from_utf8_lossy(&line[..line.len().min(SKIPPED_LINE_PREVIEW)]);
                    debug!(error = %e, line = %preview, "Skipping undecodable stdout line");
                }
            }
        }
    }

    /// Number of non-blank lines skipped so far.
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }
}
