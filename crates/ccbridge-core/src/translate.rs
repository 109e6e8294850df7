//! Claude NDJSON to OpenAI chunk translation.
//!
//! Converts the stream-json messages read from Claude's stdout into
//! `chat.completion.chunk` payloads. At most one chunk is produced per
//! message; everything outside the minimal OpenAI streaming contract (role
//! once, then text fragments, then one stop marker) is absorbed.

use crate::ndjson::{ContentDelta, InnerEvent, Message, SessionResult, StreamEvent};
use crate::openai::{
    self, ChatCompletionChunk, ChatCompletionResponse, ChunkChoice, CompletionChoice,
    CompletionResponse, Delta, FinishReason, ResponseChoice, ResponseMessage, Role,
};

/// Translator progress within one streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslatorState {
    /// Nothing emitted yet; the next `message_start` announces the role.
    #[default]
    AwaitingRole,
    /// Content is flowing. Further `message_start` events are silent.
    InProgress,
    /// The terminal chunk has been emitted.
    Done,
}

/// Per-session translator from Claude messages to chat chunks.
///
/// `id`, `created` and `model` are fixed at construction and shared by every
/// chunk of the session.
#[derive(Debug, Clone)]
pub struct StreamTranslator {
    id: String,
    model: String,
    created: u64,
    state: TranslatorState,
}

impl StreamTranslator {
    /// Create a translator stamped with the current time.
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_created(id, model, openai::unix_timestamp())
    }

    /// Create a translator with an explicit `created` timestamp.
    pub fn with_created(id: impl Into<String>, model: impl Into<String>, created: u64) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            created,
            state: TranslatorState::AwaitingRole,
        }
    }

    pub const fn state(&self) -> TranslatorState {
        self.state
    }

    pub const fn is_done(&self) -> bool {
        matches!(self.state, TranslatorState::Done)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Translate one message, returning the chunk to emit, if any.
    pub fn translate(&mut self, msg: &Message) -> Option<ChatCompletionChunk> {
        if self.is_done() {
            return None;
        }
        match msg {
            Message::StreamEvent(StreamEvent { event: Some(event) }) => {
                self.handle_inner_event(event)
            }
            Message::Result(_) => {
                self.state = TranslatorState::Done;
                Some(self.chunk(Delta::default(), Some(FinishReason::Stop)))
            }
            Message::StreamEvent(StreamEvent { event: None })
            | Message::System(_)
            | Message::Unknown => None,
        }
    }

    fn handle_inner_event(&mut self, event: &InnerEvent) -> Option<ChatCompletionChunk> {
        match event {
            InnerEvent::MessageStart if self.state == TranslatorState::AwaitingRole => {
                self.state = TranslatorState::InProgress;
                Some(self.chunk(
                    Delta {
                        role: Some(Role::Assistant),
                        content: None,
                    },
                    None,
                ))
            }
            InnerEvent::ContentBlockDelta {
                delta: Some(ContentDelta::TextDelta { text }),
                ..
            } => {
                self.state = TranslatorState::InProgress;
                Some(self.chunk(
                    Delta {
                        role: None,
                        content: Some(text.clone()),
                    },
                    None,
                ))
            }
            _ => None,
        }
    }

    fn chunk(&self, delta: Delta, finish_reason: Option<FinishReason>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: openai::CHAT_COMPLETION_CHUNK.to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }
}

/// Re-shape a chat chunk for the legacy completions stream.
///
/// The role announcement becomes an empty text fragment.
pub fn legacy_chunk(chunk: &ChatCompletionChunk) -> CompletionResponse {
    CompletionResponse {
        id: chunk.id.clone(),
        object: openai::TEXT_COMPLETION.to_string(),
        created: chunk.created,
        model: chunk.model.clone(),
        choices: chunk
            .choices
            .iter()
            .map(|choice| CompletionChoice {
                index: choice.index,
                text: choice.delta.content.clone().unwrap_or_default(),
                finish_reason: choice.finish_reason,
            })
            .collect(),
    }
}

/// Build the non-streaming chat response from the CLI's JSON result.
pub fn chat_response(result: &SessionResult, id: &str, model: &str) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: id.to_string(),
        object: openai::CHAT_COMPLETION.to_string(),
        created: openai::unix_timestamp(),
        model: model.to_string(),
        choices: vec![ResponseChoice {
            index: 0,
            message: ResponseMessage {
                role: Role::Assistant,
                content: result.text().to_string(),
            },
            finish_reason: Some(FinishReason::Stop),
        }],
    }
}

/// Build the non-streaming legacy completion from the CLI's JSON result.
pub fn completion_response(result: &SessionResult, id: &str, model: &str) -> CompletionResponse {
    CompletionResponse {
        id: id.to_string(),
        object: openai::TEXT_COMPLETION.to_string(),
        created: openai::unix_timestamp(),
        model: model.to_string(),
        choices: vec![CompletionChoice {
            index: 0,
            text: result.text().to_string(),
            finish_reason: Some(FinishReason::Stop),
        }],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ndjson::parse_line;

    const MESSAGE_START: &str = r#"{"type":"stream_event","event":{"type":"message_start"}}"#;
    const RESULT: &str = r#"{"type":"result"}"#;

    fn text_line(text: &str) -> String {
        serde_json::json!({
            "type": "stream_event",
            "event": {"type": "content_block_delta", "delta": {"type": "text_delta", "text": text}}
        })
        .to_string()
    }

    fn translator() -> StreamTranslator {
        StreamTranslator::with_created("chatcmpl-test", "claude-cli", 1_700_000_000)
    }

    fn feed(t: &mut StreamTranslator, line: &str) -> Option<ChatCompletionChunk> {
        t.translate(&parse_line(line).unwrap())
    }

    #[test]
    fn translator_starts_awaiting_role() {
        let t = translator();
        assert_eq!(t.state(), TranslatorState::AwaitingRole);
        assert!(!t.is_done());
    }

    #[test]
    fn message_start_emits_role_once() {
        let mut t = translator();
        let first = feed(&mut t, MESSAGE_START).expect("role chunk");
        assert_eq!(first.choices[0].delta.role, Some(Role::Assistant));
        assert_eq!(first.choices[0].delta.content, None);
        assert_eq!(first.choices[0].finish_reason, None);
        assert_eq!(t.state(), TranslatorState::InProgress);

        assert!(feed(&mut t, MESSAGE_START).is_none());
        assert!(feed(&mut t, MESSAGE_START).is_none());
    }

    #[test]
    fn text_delta_is_verbatim() {
        let mut t = translator();
        for text in ["Hi", "  padded  ", "\n", "", "émoji 🦀", "{\"json\":true}"] {
            let chunk = feed(&mut t, &text_line(text)).expect("content chunk");
            assert_eq!(chunk.choices[0].delta.content.as_deref(), Some(text));
            assert_eq!(chunk.choices[0].delta.role, None);
        }
    }

    #[test]
    fn content_before_role_suppresses_later_role() {
        let mut t = translator();
        assert!(feed(&mut t, &text_line("early")).is_some());
        assert_eq!(t.state(), TranslatorState::InProgress);
        assert!(feed(&mut t, MESSAGE_START).is_none());
    }

    #[test]
    fn result_emits_single_terminal_chunk() {
        let mut t = translator();
        feed(&mut t, MESSAGE_START);
        let stop = feed(&mut t, RESULT).expect("terminal chunk");
        assert_eq!(stop.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(stop.choices[0].delta, Delta::default());
        assert!(t.is_done());

        assert!(feed(&mut t, RESULT).is_none());
        assert!(feed(&mut t, &text_line("late")).is_none());
        assert!(feed(&mut t, MESSAGE_START).is_none());
    }

    #[test]
    fn result_without_any_content() {
        let mut t = translator();
        let stop = feed(&mut t, RESULT).expect("terminal chunk");
        assert_eq!(stop.choices[0].finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn ignored_messages_keep_state() {
        let ignored = [
            r#"{"type":"ping"}"#,
            r#"{"type":"system","subtype":"init","session_id":"s"}"#,
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"dup"}]}}"#,
            r#"{"type":"stream_event"}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_start","index":0}}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_delta"}}"#,
            r#"{"type":"stream_event","event":{"type":"content_block_delta","delta":{"type":"input_json_delta","partial_json":"{"}}}"#,
            r#"{"type":"stream_event","event":{"type":"message_stop"}}"#,
        ];
        let mut t = translator();
        for line in ignored {
            assert!(feed(&mut t, line).is_none(), "line emitted: {line}");
            assert_eq!(t.state(), TranslatorState::AwaitingRole);
        }
        assert!(feed(&mut t, MESSAGE_START).is_some());
        for line in ignored {
            assert!(feed(&mut t, line).is_none(), "line emitted: {line}");
            assert_eq!(t.state(), TranslatorState::InProgress);
        }
    }

    #[test]
    fn scenario_role_content_stop() {
        let mut t = translator();
        let hi = text_line("Hi");
        let chunks: Vec<_> = [MESSAGE_START, hi.as_str(), RESULT]
            .iter()
            .filter_map(|line| feed(&mut t, line))
            .collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].choices[0].delta.role, Some(Role::Assistant));
        assert_eq!(chunks[1].choices[0].delta.content.as_deref(), Some("Hi"));
        assert_eq!(chunks[2].choices[0].finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn ping_between_events_is_silent() {
        let mut t = translator();
        assert!(feed(&mut t, MESSAGE_START).is_some());
        assert!(feed(&mut t, r#"{"type":"ping"}"#).is_none());
        assert!(feed(&mut t, MESSAGE_START).is_none());
        assert!(feed(&mut t, &text_line("x")).is_some());
    }

    #[test]
    fn chunks_share_session_identity() {
        let mut t = translator();
        let (a, b) = (text_line("a"), text_line("b"));
        let chunks: Vec<_> = [MESSAGE_START, a.as_str(), b.as_str(), RESULT]
            .iter()
            .filter_map(|line| feed(&mut t, line))
            .collect();
        for chunk in &chunks {
            assert_eq!(chunk.id, "chatcmpl-test");
            assert_eq!(chunk.model, "claude-cli");
            assert_eq!(chunk.created, 1_700_000_000);
            assert_eq!(chunk.object, "chat.completion.chunk");
            assert_eq!(chunk.choices.len(), 1);
            assert_eq!(chunk.choices[0].index, 0);
        }
    }

    #[test]
    fn role_chunk_wire_shape() {
        let mut t = translator();
        let chunk = feed(&mut t, MESSAGE_START).unwrap();
        assert_eq!(
            serde_json::to_string(&chunk).unwrap(),
            r#"{"id":"chatcmpl-test","object":"chat.completion.chunk","created":1700000000,"model":"claude-cli","choices":[{"index":0,"delta":{"role":"assistant"},"finish_reason":null}]}"#
        );
    }

    #[test]
    fn terminal_chunk_wire_shape() {
        let mut t = translator();
        let chunk = feed(&mut t, RESULT).unwrap();
        assert_eq!(
            serde_json::to_string(&chunk.choices[0]).unwrap(),
            r#"{"index":0,"delta":{},"finish_reason":"stop"}"#
        );
    }

    #[test]
    fn legacy_chunk_maps_text() {
        let mut t = translator();
        let role = legacy_chunk(&feed(&mut t, MESSAGE_START).unwrap());
        assert_eq!(role.object, "text_completion");
        assert_eq!(role.choices[0].text, "");
        let content = legacy_chunk(&feed(&mut t, &text_line("abc")).unwrap());
        assert_eq!(content.choices[0].text, "abc");
        assert_eq!(content.choices[0].finish_reason, None);
        let stop = legacy_chunk(&feed(&mut t, RESULT).unwrap());
        assert_eq!(stop.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(stop.id, "chatcmpl-test");
    }

    #[test]
    fn chat_response_keeps_result_text() {
        let result = SessionResult {
            result: Some("  multi\nline ✓ ".to_string()),
            ..SessionResult::default()
        };
        let resp = chat_response(&result, "chatcmpl-1", "claude-cli");
        assert_eq!(resp.object, "chat.completion");
        assert_eq!(resp.choices.len(), 1);
        assert_eq!(resp.choices[0].message.content, "  multi\nline ✓ ");
        assert_eq!(resp.choices[0].message.role, Role::Assistant);
        assert_eq!(resp.choices[0].finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn completion_response_keeps_result_text() {
        let result = SessionResult {
            result: Some("text".to_string()),
            ..SessionResult::default()
        };
        let resp = completion_response(&result, "cmpl-1", "claude-cli");
        assert_eq!(resp.object, "text_completion");
        assert_eq!(resp.choices[0].text, "text");
    }
}
