//! ccbridge Server Library
//!
//! Serves an OpenAI-compatible HTTP API backed by the `claude` CLI:
//! - Subprocess bridge for Claude Code processes (one per request)
//! - Bounded NDJSON line decoding of the CLI's stdout
//! - Streaming sessions: translation, SSE emission, cancellation
//! - axum routes and handlers

pub mod config;
pub mod emitter;
pub mod server;
pub mod session;
pub mod subprocess;

pub use config::BridgeConfig;
