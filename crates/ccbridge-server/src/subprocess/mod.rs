//! Subprocess bridge for Claude Code processes.

pub mod decoder;
pub mod executor;

pub use decoder::{DEFAULT_MAX_LINE_BYTES, DecodeError, EventDecoder, LineReader};
pub use executor::{ClaudeExecutor, OutputMode, StderrDrain, StreamingProcess, SubprocessError};
