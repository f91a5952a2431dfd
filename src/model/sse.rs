//! Server-sent events decoding for streamed chat completions.
//!
//! OpenAI-compatible providers stream `data: {json}` lines separated by
//! blank lines and finish with `data: [DONE]`. Lines can be split across
//! TCP chunks, even inside a multi-byte character, so the decoder buffers
//! raw bytes and only decodes complete lines.

use serde_json::Value;

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// A JSON `data:` payload.
    Data(Value),
    /// The `[DONE]` terminator.
    Done,
}

/// Incremental SSE line decoder.
///
/// # Example
///
/// ```
/// use prompt_pipe::model::sse::{SseDecoder, SseEvent};
///
/// let mut decoder = SseDecoder::new();
/// let data = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\ndata: [DONE]\n\n";
/// let events = decoder.push(data);
/// assert_eq!(events.len(), 2);
/// assert_eq!(events[1], SseEvent::Done);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every event completed by this chunk.
    ///
    /// `event:`, `id:`, comment lines, blank keep-alives, and `data:`
    /// payloads that are not valid JSON are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            events.extend(decode_line(&String::from_utf8_lossy(&line)));
        }
        events
    }

    /// Decode whatever is left once the body ends without a trailing newline.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        String::from_utf8_lossy(&rest)
            .lines()
            .filter_map(decode_line)
            .collect()
    }
}

fn decode_line(line: &str) -> Option<SseEvent> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    serde_json::from_str(data).ok().map(SseEvent::Data)
}

/// Extract `choices[0].delta.content` from a streamed chunk.
pub fn delta_content(chunk: &Value) -> Option<&str> {
    chunk
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_data_and_done() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"x\":1}\n\ndata: [DONE]\n\n");
        assert_eq!(events, vec![SseEvent::Data(json!({"x": 1})), SseEvent::Done]);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"cho").is_empty());
        let events = decoder.push(b"ices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n");
        assert_eq!(events.len(), 1);
        match &events[0] {
            SseEvent::Data(v) => assert_eq!(delta_content(v), Some("Hi")),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"مرحبا\"}}]}\n\n";
        let bytes = line.as_bytes();
        let cut = line.find('م').unwrap() + 1;
        assert!(!line.is_char_boundary(cut));

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&bytes[..cut]).is_empty());
        let events = decoder.push(&bytes[cut..]);
        assert_eq!(events.len(), 1);
        match &events[0] {
            SseEvent::Data(v) => assert_eq!(delta_content(v), Some("مرحبا")),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_skips_non_data_lines() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\nevent: message\nid: 7\r\ndata:{\"x\":2}\r\n\r\n");
        assert_eq!(events, vec![SseEvent::Data(json!({"x": 2}))]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"x\":3}").is_empty());
        assert_eq!(decoder.finish(), vec![SseEvent::Data(json!({"x": 3}))]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_delta_content_missing() {
        assert_eq!(delta_content(&json!({"choices": [{"delta": {}}]})), None);
        assert_eq!(delta_content(&json!({})), None);
    }
}
