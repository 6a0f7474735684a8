//! Event Stream Decoder
//!
//! Incremental parser for `text/event-stream` bodies. Bytes can be fed in
//! arbitrary chunks; complete events come out as [`FeedFrame`]s.
//!
//! # Format
//!
//! ```text
//! : keep-alive comment
//! event: update
//! id: 42
//! data: {"symbol":"BTC",...}
//!
//! ```
//!
//! Lines end in LF, CRLF, or CR. A blank line dispatches the pending event.
//! Multiple `data:` lines are joined with `\n`. An event that grows past the
//! frame limit before it is dispatched is an error.

use crate::domain::feed::FeedFrame;

/// Event name used when the stream does not set one.
pub const DEFAULT_EVENT: &str = "message";

/// Default upper bound on the bytes buffered for one pending event.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

const BOM: char = '\u{FEFF}';

/// Decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The pending event exceeded the frame limit.
    #[error("event exceeds {limit} bytes without a terminator")]
    FrameTooLarge {
        /// Configured limit.
        limit: usize,
    },
}

/// Stateful `text/event-stream` parser.
#[derive(Debug)]
pub struct SseDecoder {
    max_frame_bytes: usize,
    line: Vec<u8>,
    after_cr: bool,
    seen_first_line: bool,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_id: Option<String>,
    retry_ms: Option<u64>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    /// Create a decoder at the start of a stream.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_bytes(DEFAULT_MAX_FRAME_BYTES)
    }

    /// Create a decoder that buffers at most `max_frame_bytes` per event.
    #[must_use]
    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            line: Vec::new(),
            after_cr: false,
            seen_first_line: false,
            event: None,
            data: String::new(),
            has_data: false,
            last_id: None,
            retry_ms: None,
        }
    }

    /// Consume a chunk and return every event it completed.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::FrameTooLarge`] once the pending line and data
    /// together exceed the frame limit. Buffered input is discarded.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<FeedFrame>, DecodeError> {
        let mut frames = Vec::new();

        for &byte in chunk {
            match byte {
                b'\n' if self.after_cr => {
                    self.after_cr = false;
                }
                b'\n' | b'\r' => {
                    self.after_cr = byte == b'\r';
                    let line = std::mem::take(&mut self.line);
                    if let Some(frame) = self.process_line(&line) {
                        frames.push(frame);
                    }
                }
                _ => {
                    self.after_cr = false;
                    if self.line.len() + self.data.len() >= self.max_frame_bytes {
                        self.line.clear();
                        self.data.clear();
                        self.has_data = false;
                        return Err(DecodeError::FrameTooLarge {
                            limit: self.max_frame_bytes,
                        });
                    }
                    self.line.push(byte);
                }
            }
        }

        Ok(frames)
    }

    /// Last `id:` value seen on the stream.
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    /// Last `retry:` value seen on the stream, in milliseconds.
    #[must_use]
    pub const fn retry_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<FeedFrame> {
        let decoded = String::from_utf8_lossy(raw);
        let mut line: &str = &decoded;
        if !self.seen_first_line {
            self.seen_first_line = true;
            line = line.strip_prefix(BOM).unwrap_or(line);
        }

        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry_ms = Some(ms);
                }
            }
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<FeedFrame> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }

        self.has_data = false;
        Some(FeedFrame {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &str) -> Vec<FeedFrame> {
        SseDecoder::new().feed(input.as_bytes()).unwrap()
    }

    #[test]
    fn decodes_named_event() {
        let frames = decode_all("event: update\ndata: {\"a\":1}\n\n");
        assert_eq!(frames, vec![FeedFrame::new("update", "{\"a\":1}")]);
    }

    #[test]
    fn default_event_name_is_message() {
        let frames = decode_all("data: hello\n\n");
        assert_eq!(frames[0].event, "message");
    }

    #[test]
    fn joins_multiline_data() {
        let frames = decode_all("event: snapshot\ndata: [\ndata: 1\ndata: ]\n\n");
        assert_eq!(frames[0].data, "[\n1\n]");
    }

    #[test]
    fn ignores_comments_and_unknown_fields() {
        let frames = decode_all(": keep-alive\n\nfoo: bar\nevent: update\ndata: x\n\n");
        assert_eq!(frames, vec![FeedFrame::new("update", "x")]);
    }

    #[test]
    fn event_without_data_is_not_dispatched() {
        let frames = decode_all("event: update\n\ndata: x\n\n");
        assert_eq!(frames, vec![FeedFrame::new("message", "x")]);
    }

    #[test]
    fn handles_crlf_and_cr() {
        let frames = decode_all("event: a\r\ndata: 1\r\n\r\nevent: b\rdata: 2\r\r");
        assert_eq!(
            frames,
            vec![FeedFrame::new("a", "1"), FeedFrame::new("b", "2")]
        );
    }

    #[test]
    fn survives_arbitrary_chunking() {
        let input = "event: update\r\ndata: {\"symbol\":\"BTC\"}\r\n\r\nevent: snapshot\ndata: []\n\n";
        let expected = decode_all(input);

        for split in 0..input.len() {
            let (a, b) = input.as_bytes().split_at(split);
            let mut decoder = SseDecoder::new();
            let mut frames = decoder.feed(a).unwrap();
            frames.extend(decoder.feed(b).unwrap());
            assert_eq!(frames, expected, "split at {split}");
        }
    }

    #[test]
    fn byte_by_byte() {
        let input = "event: update\r\ndata: é\r\n\r\n";
        let mut decoder = SseDecoder::new();
        let frames: Vec<_> = input
            .as_bytes()
            .iter()
            .flat_map(|b| decoder.feed(std::slice::from_ref(b)).unwrap())
            .collect();
        assert_eq!(frames, vec![FeedFrame::new("update", "é")]);
    }

    #[test]
    fn tracks_id_and_retry() {
        let mut decoder = SseDecoder::new();
        let frames = decoder
            .feed(b"id: 7\nretry: 2500\ndata: x\n\ndata: y\n\n")
            .unwrap();

        assert_eq!(frames[0].id.as_deref(), Some("7"));
        assert_eq!(frames[1].id.as_deref(), Some("7"));
        assert_eq!(decoder.last_event_id(), Some("7"));
        assert_eq!(decoder.retry_ms(), Some(2500));
    }

    #[test]
    fn strips_one_leading_space_only() {
        let frames = decode_all("data:  two\n\ndata:none\n\n");
        assert_eq!(frames[0].data, " two");
        assert_eq!(frames[1].data, "none");
    }

    #[test]
    fn strips_leading_bom() {
        let frames = decode_all("\u{FEFF}event: update\ndata: x\n\n");
        assert_eq!(frames, vec![FeedFrame::new("update", "x")]);
    }

    #[test]
    fn incomplete_event_is_held() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: update\ndata: x\n").unwrap().is_empty());
        assert_eq!(decoder.feed(b"\n").unwrap(), vec![FeedFrame::new("update", "x")]);
    }

    #[test]
    fn unterminated_line_over_limit_fails() {
        let mut decoder = SseDecoder::with_max_frame_bytes(64);
        let line = vec![b'a'; 65];

        assert_eq!(
            decoder.feed(&line),
            Err(DecodeError::FrameTooLarge { limit: 64 })
        );
    }

    #[test]
    fn endless_data_lines_over_limit_fail() {
        let mut decoder = SseDecoder::with_max_frame_bytes(64);
        let mut outcome = Ok(Vec::new());
        for _ in 0..20 {
            outcome = decoder.feed(b"data: 0123456789\n");
            if outcome.is_err() {
                break;
            }
        }

        assert_eq!(outcome, Err(DecodeError::FrameTooLarge { limit: 64 }));
    }

    #[test]
    fn dispatched_events_do_not_count_toward_limit() {
        let mut decoder = SseDecoder::with_max_frame_bytes(64);
        for _ in 0..100 {
            let frames = decoder.feed(b"event: update\ndata: 0123456789\n\n").unwrap();
            assert_eq!(frames, vec![FeedFrame::new("update", "0123456789")]);
        }
    }
}
