//! NDJSON parser for the Claude Code stream-json protocol.
//!
//! Each stdout line of `claude --output-format stream-json` is one
//! self-contained JSON message. Every level of the message is a tagged enum
//! with an `Unknown` arm, so tags introduced by newer CLI versions decode
//! successfully and are ignored downstream.

mod parser;
mod types;

pub use parser::{parse_bytes, parse_line, parse_result_document};
pub use types::*;
