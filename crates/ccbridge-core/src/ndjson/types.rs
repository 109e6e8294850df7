//! Message types for the Claude Code NDJSON protocol.

use serde::Deserialize;
use serde_json::Value;

/// Top-level message from Claude Code, keyed by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Session metadata (`system` / `init`).
    System(SystemInit),
    /// Partial-message wrapper emitted with `--include-partial-messages`.
    StreamEvent(StreamEvent),
    /// Terminal message carrying completion metadata.
    Result(SessionResult),
    /// Any other tag (`assistant`, `user`, future additions).
    #[serde(other)]
    Unknown,
}

/// System initialization message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct SystemInit {
    pub subtype: Option<String>,
    pub session_id: String,
    pub model: String,
    pub tools: Vec<Value>,
}

/// `stream_event` wrapper around one Anthropic streaming event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamEvent {
    #[serde(default)]
    pub event: Option<InnerEvent>,
}

/// Anthropic streaming event, keyed by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InnerEvent {
    /// A new assistant turn begins.
    MessageStart,
    /// Incremental content for one content block.
    ContentBlockDelta {
        #[serde(default)]
        delta: Option<ContentDelta>,
    },
    #[serde(other)]
    Unknown,
}

/// Delta payload of a `content_block_delta`, keyed by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    TextDelta { text: String },
    #[serde(other)]
    Unknown,
}

/// Session completion result.
///
/// Also the shape of the single document printed by
/// `claude --output-format json`. Every field is optional so that a terse
/// `{"type":"result"}` still terminates the stream.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SessionResult {
    pub subtype: Option<String>,
    pub is_error: bool,
    pub result: Option<String>,
    pub session_id: Option<String>,
    pub duration_ms: Option<u64>,
    pub num_turns: Option<u32>,
    pub total_cost_usd: Option<f64>,
}

impl SessionResult {
    /// Final response text, empty when the CLI omitted it.
    pub fn text(&self) -> &str {
        self.result.as_deref().unwrap_or_default()
    }
}
