// Line-delimited stream decoder
//
// Feeds raw response bytes in and yields one StreamEvent per complete line.
// Handles SSE framing ("data: ...", comments, other fields) as well as bare
// JSON lines, which some OpenAI-compatible endpoints emit.

use serde::Deserialize;

/// End-of-stream marker sent by OpenAI-compatible endpoints
pub const DONE_MARKER: &str = "[DONE]";

/// One decoded line of a streamed chat completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Content delta carrying non-empty text
    Content(String),
    /// Keep-alive, comment, role-only delta or any other non-content line
    Heartbeat,
    /// End marker
    Done,
    /// Error object reported inside the stream
    ServerError(String),
    /// Payload that is not JSON
    Malformed(String),
}

/// Stateful decoder; keeps a partial trailing line between feeds
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and drain every complete line as an event
    pub fn feed<'a>(&'a mut self, bytes: &[u8]) -> impl Iterator<Item = StreamEvent> + 'a {
        self.buffer.extend_from_slice(bytes);
        std::iter::from_fn(move || {
            let newline = self.buffer.iter().position(|b| *b == b'\n')?;
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            Some(decode_line(&line[..newline]))
        })
    }

    /// Flush a final line that was not newline-terminated
    pub fn finish(self) -> Option<StreamEvent> {
        if self.buffer.iter().all(|b| b.is_ascii_whitespace()) {
            return None;
        }
        Some(decode_line(&self.buffer))
    }
}

/// Classify a single line (without its trailing newline)
pub fn decode_line(raw: &[u8]) -> StreamEvent {
    let text = String::from_utf8_lossy(raw);
    let line = text.strip_suffix('\r').unwrap_or(&text);

    if line.trim().is_empty() || line.starts_with(':') {
        return StreamEvent::Heartbeat;
    }

    let payload = match line.strip_prefix("data:") {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None if is_sse_field(line) => return StreamEvent::Heartbeat,
        None => line,
    };
    let payload = payload.trim();

    if payload == DONE_MARKER {
        return StreamEvent::Done;
    }

    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(_) => return StreamEvent::Malformed(payload.to_string()),
    };

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        return StreamEvent::ServerError(describe_error(error));
    }

    match serde_json::from_value::<StreamChunk>(value) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(StreamEvent::Content)
            .unwrap_or(StreamEvent::Heartbeat),
        // Valid JSON that is not a chunk (usage frames, pings with payloads)
        Err(_) => StreamEvent::Heartbeat,
    }
}

fn is_sse_field(line: &str) -> bool {
    ["event:", "id:", "retry:"]
        .iter()
        .any(|field| line.starts_with(field))
}

fn describe_error(error: &serde_json::Value) -> String {
    match error {
        serde_json::Value::String(message) => message.clone(),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

// ============================================================================
// Chunk payload (OpenAI chat.completion.chunk)
// ============================================================================

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> String {
        serde_json::json!({
            "choices": [{"index": 0, "delta": {"content": content}}]
        })
        .to_string()
    }

    #[test]
    fn test_sse_content_line() {
        let line = format!("data: {}", chunk("Hello"));
        assert_eq!(
            decode_line(line.as_bytes()),
            StreamEvent::Content("Hello".to_string())
        );
    }

    #[test]
    fn test_bare_json_line_is_accepted() {
        assert_eq!(
            decode_line(chunk("Hi").as_bytes()),
            StreamEvent::Content("Hi".to_string())
        );
    }

    #[test]
    fn test_data_prefix_without_space() {
        let line = format!("data:{}", chunk("x"));
        assert_eq!(decode_line(line.as_bytes()), StreamEvent::Content("x".into()));
    }

    #[test]
    fn test_non_content_lines() {
        assert_eq!(decode_line(b""), StreamEvent::Heartbeat);
        assert_eq!(decode_line(b": keep-alive"), StreamEvent::Heartbeat);
        assert_eq!(decode_line(b"event: message"), StreamEvent::Heartbeat);
        assert_eq!(decode_line(b"retry: 3000"), StreamEvent::Heartbeat);

        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(decode_line(role_only.as_bytes()), StreamEvent::Heartbeat);

        let empty_content = format!("data: {}", chunk(""));
        assert_eq!(decode_line(empty_content.as_bytes()), StreamEvent::Heartbeat);

        let finish = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(decode_line(finish.as_bytes()), StreamEvent::Heartbeat);

        let usage = r#"data: {"choices":[],"usage":{"total_tokens":12}}"#;
        assert_eq!(decode_line(usage.as_bytes()), StreamEvent::Heartbeat);
    }

    #[test]
    fn test_done_marker() {
        assert_eq!(decode_line(b"data: [DONE]"), StreamEvent::Done);
        assert_eq!(decode_line(b"[DONE]\r"), StreamEvent::Done);
    }

    #[test]
    fn test_error_and_malformed_payloads() {
        let error = r#"data: {"error":{"message":"model not found","code":"404"}}"#;
        assert_eq!(
            decode_line(error.as_bytes()),
            StreamEvent::ServerError("model not found".to_string())
        );
        assert_eq!(
            decode_line(b"data: not json"),
            StreamEvent::Malformed("not json".to_string())
        );
    }

    #[test]
    fn test_feed_handles_lines_split_across_chunks() {
        let body = format!("data: {}\r\n\r\ndata: {}\n\ndata: [DONE]\n", chunk("你好"), chunk("!"));
        let bytes = body.as_bytes();

        let mut decoder = SseDecoder::new();
        let mut events = Vec::new();
        // Feed one byte at a time, splitting multi-byte characters too
        for b in bytes {
            events.extend(decoder.feed(std::slice::from_ref(b)));
        }
        assert!(decoder.finish().is_none());

        let meaningful: Vec<StreamEvent> = events
            .into_iter()
            .filter(|e| *e != StreamEvent::Heartbeat)
            .collect();
        assert_eq!(
            meaningful,
            vec![
                StreamEvent::Content("你好".to_string()),
                StreamEvent::Content("!".to_string()),
                StreamEvent::Done,
            ]
        );
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        let events: Vec<_> = decoder.feed(b"data: [DONE]").collect();
        assert!(events.is_empty());
        assert_eq!(decoder.finish(), Some(StreamEvent::Done));
    }
}
