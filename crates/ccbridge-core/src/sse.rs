//! Server-Sent Events framing.
//!
//! Every payload becomes exactly one `data: <json>\n\n` frame; the stream is
//! closed with `data: [DONE]\n\n`.

use serde::Serialize;

use crate::error::Result;

/// Terminal sentinel frame.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

pub const CONTENT_TYPE: &str = "text/event-stream";

/// Headers sent with every event stream response (besides `Content-Type`).
/// `X-Accel-Buffering` stops nginx-style proxies from holding frames back.
pub const STREAM_HEADERS: [(&str, &str); 3] = [
    ("cache-control", "no-cache"),
    ("connection", "keep-alive"),
    ("x-accel-buffering", "no"),
];

/// Serialize `payload` as compact JSON inside one SSE data frame.
pub fn data_frame<T: Serialize>(payload: &T) -> Result<String> {
    let json = serde_json::to_string(payload)?;
    Ok(format!("data: {json}\n\n"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_compact_and_terminated() {
        let frame = data_frame(&serde_json::json!({"a": 1, "b": [true]})).unwrap();
        assert_eq!(frame, "data: {\"a\":1,\"b\":[true]}\n\n");
    }

    #[test]
    fn newlines_in_payload_stay_escaped() {
        let frame = data_frame(&serde_json::json!({"content": "line1\nline2"})).unwrap();
        assert_eq!(frame.matches('\n').count(), 2);
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn done_sentinel() {
        assert_eq!(DONE_FRAME, "data: [DONE]\n\n");
    }
}
