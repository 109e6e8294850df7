//! SSE emission into a streaming HTTP body.
//!
//! A session writes frames into a bounded channel; the response body drains
//! it, one frame per body chunk, so hyper writes every frame to the socket
//! as soon as it is produced. The body holds a drop guard for the session's
//! cancellation token: when the client goes away and the body is dropped,
//! the session is cancelled.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::{HeaderName, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

use ccbridge_core::openai::ChatCompletionChunk;
use ccbridge_core::sse;
use ccbridge_core::translate::legacy_chunk;

/// Wire shape of the emitted chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// `chat.completion.chunk` payloads.
    Chat,
    /// Legacy `text_completion` payloads.
    Legacy,
}

/// Frame delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("client disconnected")]
    Closed,

    #[error("failed to encode chunk: {0}")]
    Encode(#[from] ccbridge_core::Error),
}

/// Writing half: serializes chunks into SSE frames.
#[derive(Debug)]
pub struct SseEmitter {
    tx: mpsc::Sender<Bytes>,
    format: StreamFormat,
    frames_sent: usize,
}

/// Reading half: the HTTP response body.
#[derive(Debug)]
pub struct SseBody {
    frames: ReceiverStream<Bytes>,
    _cancel_on_drop: DropGuard,
}

impl SseEmitter {
    /// Create a connected emitter/body pair.
    ///
    /// `cancel` fires when the returned body is dropped.
    pub fn channel(format: StreamFormat, cancel: &CancellationToken, capacity: usize) -> (Self, SseBody) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let emitter = Self {
            tx,
            format,
            frames_sent: 0,
        };
        let body = SseBody {
            frames: ReceiverStream::new(rx),
            _cancel_on_drop: cancel.clone().drop_guard(),
        };
        (emitter, body)
    }

    /// Serialize and deliver one chunk.
    pub async fn send_chunk(&mut self, chunk: &ChatCompletionChunk) -> Result<(), EmitError> {
        let frame = match self.format {
            StreamFormat::Chat => sse::data_frame(chunk)?,
            StreamFormat::Legacy => sse::data_frame(&legacy_chunk(chunk))?,
        };
        self.send_frame(frame).await
    }

    /// Deliver the `[DONE]` sentinel.
    pub async fn send_done(&mut self) -> Result<(), EmitError> {
        self.send_frame(sse::DONE_FRAME.to_string()).await
    }

    /// Frames delivered so far, sentinel included.
    pub const fn frames_sent(&self) -> usize {
        self.frames_sent
    }

    async fn send_frame(&mut self, frame: String) -> Result<(), EmitError> {
        self.tx
            .send(Bytes::from(frame))
            .await
            .map_err(|_| EmitError::Closed)?;
        self.frames_sent += 1;
        Ok(())
    }
}

impl Stream for SseBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.frames).poll_next(cx).map(|frame| frame.map(Ok))
    }
}

impl IntoResponse for SseBody {
    fn into_response(self) -> Response {
        let mut response = Body::from_stream(self).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(sse::CONTENT_TYPE));
        for (name, value) in sse::STREAM_HEADERS {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ccbridge_core::StreamTranslator;
    use ccbridge_core::ndjson::parse_line;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    fn role_chunk() -> ChatCompletionChunk {
        let mut translator = StreamTranslator::with_created("chatcmpl-1", "claude-cli", 7);
        translator
            .translate(&parse_line(r#"{"type":"stream_event","event":{"type":"message_start"}}"#).unwrap())
            .unwrap()
    }

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let cancel = CancellationToken::new();
        let (mut emitter, mut body) = SseEmitter::channel(StreamFormat::Chat, &cancel, 4);
        emitter.send_chunk(&role_chunk()).await.unwrap();
        emitter.send_done().await.unwrap();
        assert_eq!(emitter.frames_sent(), 2);
        drop(emitter);

        let first = body.next().await.unwrap().unwrap();
        assert_eq!(
            first,
            "data: {\"id\":\"chatcmpl-1\",\"object\":\"chat.completion.chunk\",\"created\":7,\"model\":\"claude-cli\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}\n\n"
        );
        let second = body.next().await.unwrap().unwrap();
        assert_eq!(second, "data: [DONE]\n\n");
        assert!(body.next().await.is_none());
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn legacy_format_reshapes_chunks() {
        let cancel = CancellationToken::new();
        let (mut emitter, mut body) = SseEmitter::channel(StreamFormat::Legacy, &cancel, 4);
        emitter.send_chunk(&role_chunk()).await.unwrap();
        let frame = body.next().await.unwrap().unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("data: {\"id\":\"chatcmpl-1\",\"object\":\"text_completion\""));
        assert!(text.contains("\"text\":\"\""));
    }

    #[tokio::test]
    async fn send_waits_for_body_to_take_previous_frame() {
        let cancel = CancellationToken::new();
        let (mut emitter, mut body) = SseEmitter::channel(StreamFormat::Chat, &cancel, 1);
        emitter.send_chunk(&role_chunk()).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), emitter.send_done()).await;
        assert!(blocked.is_err(), "second frame must wait for the body");
        assert_eq!(emitter.frames_sent(), 1);

        assert!(body.next().await.is_some());
        emitter.send_done().await.unwrap();
        assert_eq!(body.next().await.unwrap().unwrap(), "data: [DONE]\n\n");
    }

    #[tokio::test]
    async fn dropping_body_cancels_and_closes() {
        let cancel = CancellationToken::new();
        let (mut emitter, body) = SseEmitter::channel(StreamFormat::Chat, &cancel, 4);
        drop(body);
        assert!(cancel.is_cancelled());
        assert!(matches!(emitter.send_done().await, Err(EmitError::Closed)));
        assert_eq!(emitter.frames_sent(), 0);
    }

    #[test]
    fn response_headers() {
        let cancel = CancellationToken::new();
        let (_emitter, body) = SseEmitter::channel(StreamFormat::Chat, &cancel, 1);
        let response = body.into_response();
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers["x-accel-buffering"], "no");
    }
}
