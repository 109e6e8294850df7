//! `ccbridge` Core Library
//!
//! Shared functionality for the `ccbridge` server:
//! - NDJSON parsing for the Claude Code stream-json protocol
//! - OpenAI-compatible wire types
//! - Prompt building from chat messages
//! - Stream translation from Claude events to completion chunks
//! - SSE framing
//! - Common error types

pub mod error;
pub mod ndjson;
pub mod openai;
pub mod prompt;
pub mod sse;
pub mod tracing_init;
pub mod translate;

pub use error::{Error, Result};
pub use translate::{StreamTranslator, TranslatorState};
