//! Runtime configuration shared by the router and the subprocess bridge.

use std::path::PathBuf;

use crate::subprocess::DEFAULT_MAX_LINE_BYTES;

/// Bridge configuration resolved from CLI flags and environment.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Path to the `claude` binary.
    pub claude_bin: PathBuf,
    /// Tools pre-approved via `--allowedTools`.
    pub allowed_tools: Vec<String>,
    /// Model name reported in every response.
    pub model_label: String,
    /// Longest stdout line accepted from the CLI.
    pub max_line_bytes: usize,
    /// SSE frames queued between a session and its HTTP body. With 1 the
    /// next stdout line is read only once the previous frame was taken by
    /// the body.
    pub frame_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            claude_bin: PathBuf::from("claude"),
            allowed_tools: vec!["WebFetch".to_string(), "WebSearch".to_string()],
            model_label: "claude-cli".to_string(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            frame_buffer: 1,
        }
    }
}
