//! NDJSON parser for the Claude Code protocol.
//!
//! Implements the tolerant reader pattern: unknown fields are ignored and
//! unknown tags decode to `Unknown` arms. Only structurally broken lines
//! (invalid JSON, missing `type`, wrong payload shape) are errors.

use super::types::{Message, SessionResult};
use crate::error::{Error, Result};

/// Parse a single NDJSON line from Claude's stdout.
pub fn parse_line(line: &str) -> Result<Message> {
    parse_bytes(line.as_bytes())
}

/// Parse a raw stdout line. Invalid UTF-8 is reported as a parse error.
pub fn parse_bytes(line: &[u8]) -> Result<Message> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return Err(Error::NdjsonParse("Empty line".into()));
    }
    Ok(serde_json::from_slice(trimmed)?)
}

/// Parse the single JSON document printed by `--output-format json`.
pub fn parse_result_document(doc: &[u8]) -> Result<SessionResult> {
    let trimmed = doc.trim_ascii();
    if trimmed.is_empty() {
        return Err(Error::NdjsonParse("Empty output".into()));
    }
    Ok(serde_json::from_slice(trimmed)?)
}
