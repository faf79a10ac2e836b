//! Incremental Server-Sent Events decoder.
//!
//! Bytes arrive in arbitrary chunks from the HTTP body; frames are emitted once
//! their terminating blank line has been seen. Handles LF and CRLF line endings,
//! multi-line `data:` fields, comments and a chunk boundary anywhere (including
//! inside a UTF-8 sequence).

/// Event name used when a frame has no `event:` field.
const DEFAULT_EVENT: &str = "message";

/// Upper bound on undecoded bytes plus buffered `data:` lines for one frame.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseError {
    /// A single frame outgrew `MAX_FRAME_BYTES` without being terminated.
    FrameTooLarge { limit: usize },
}

impl std::fmt::Display for SseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SseError::FrameTooLarge { limit } => {
                write!(f, "SSE frame exceeds {} bytes without terminating", limit)
            }
        }
    }
}

impl std::error::Error for SseError {}

#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    data_len: usize,
    last_id: Option<String>,
    max_frame_bytes: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_FRAME_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            event: None,
            data: Vec::new(),
            data_len: 0,
            last_id: None,
            max_frame_bytes,
        }
    }

    /// Feed a chunk, returning every frame it completed.
    ///
    /// Fails once the unterminated frame outgrows the limit; the decoder
    /// should then be `reset` along with the connection.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, SseError> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        if self.buffer.len() + self.data_len > self.max_frame_bytes {
            return Err(SseError::FrameTooLarge {
                limit: self.max_frame_bytes,
            });
        }
        Ok(frames)
    }

    /// The last `id:` seen, for `Last-Event-ID` on reconnect.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    /// Drop any partial frame (connection lost mid-event).
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.event = None;
        self.data.clear();
        self.data_len = 0;
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data_len += value.len();
                self.data.push(value.to_string());
            }
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            // `retry` is ignored: the reconnect delay is configured, not negotiated.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        self.data_len = 0;
        Some(SseFrame {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[test]
    fn test_named_event() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"event: status\ndata: {\"connected\":true}\n\n").unwrap();
        assert_eq!(
            frames,
            vec![SseFrame {
                event: "status".to_string(),
                data: "{\"connected\":true}".to_string(),
                id: None,
            }]
        );
    }

    #[test]
    fn test_crlf_comments_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b": keep-alive\r\nid: 7\r\ndata: a\r\ndata: b\r\n\r\n").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "message");
        assert_eq!(frames[0].data, "a\nb");
        assert_eq!(frames[0].id.as_deref(), Some("7"));
        assert_eq!(decoder.last_event_id(), Some("7"));
    }

    #[test]
    fn test_blank_line_without_data_dispatches_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: ping\n\n").unwrap().is_empty());
        // The stale event name does not leak into the next frame.
        let frames = decoder.feed(b"data: x\n\n").unwrap();
        assert_eq!(frames[0].event, "message");
    }

    #[test]
    fn test_reset_drops_partial_frame() {
        let mut decoder = SseDecoder::new();
        decoder.feed(b"event: signal\ndata: {\"par").unwrap();
        decoder.reset();
        let frames = decoder.feed(b"event: ping\ndata: {}\n\n").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "ping");
        assert_eq!(frames[0].data, "{}");
    }

    #[tokio::test]
    async fn test_frames_split_across_chunks() {
        let body = "event: double_result\ndata: {\"type\":\"double_result\",\"data\":{\"color\":\"red\",\"number\":5}}\n\nevent: ping\ndata: {}\n\n";
        let bytes = body.as_bytes();
        // Boundaries fall mid-field and mid-payload.
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(bytes[..7].to_vec()),
            Ok(bytes[7..40].to_vec()),
            Ok(bytes[40..].to_vec()),
        ];
        let mut stream = futures_util::stream::iter(chunks);

        let mut decoder = SseDecoder::new();
        let mut frames = Vec::new();
        while let Some(chunk) = stream.next().await {
            frames.extend(decoder.feed(&chunk.unwrap()).unwrap());
        }

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "double_result");
        assert!(frames[0].data.contains("\"number\":5"));
        assert_eq!(frames[1].event, "ping");
    }

    #[test]
    fn test_utf8_split_inside_character() {
        let mut decoder = SseDecoder::new();
        let payload = "data: Padrão\n\n".as_bytes();
        let split = payload.iter().position(|b| *b >= 0x80).unwrap() + 1;
        assert!(decoder.feed(&payload[..split]).unwrap().is_empty());
        let frames = decoder.feed(&payload[split..]).unwrap();
        assert_eq!(frames[0].data, "Padrão");
    }

    #[test]
    fn test_unterminated_line_hits_limit() {
        let mut decoder = SseDecoder::with_limit(64);
        assert!(decoder.feed(&[b'x'; 40]).unwrap().is_empty());
        assert_eq!(
            decoder.feed(&[b'x'; 40]),
            Err(SseError::FrameTooLarge { limit: 64 })
        );

        decoder.reset();
        let frames = decoder.feed(b"data: ok\n\n").unwrap();
        assert_eq!(frames[0].data, "ok");
    }

    #[test]
    fn test_endless_data_lines_hit_limit() {
        let mut decoder = SseDecoder::with_limit(64);
        let mut result = Ok(Vec::new());
        for _ in 0..10 {
            result = decoder.feed(b"data: 0123456789\n");
            if result.is_err() {
                break;
            }
        }
        assert_eq!(result, Err(SseError::FrameTooLarge { limit: 64 }));
    }
}
