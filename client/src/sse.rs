//! Incremental decoder for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks; a frame is dispatched on the blank line
//! that terminates it. Lines end in CRLF, LF or a lone CR. Only `data` and
//! `event` are kept; `id` and `retry` are ignored.

use tracing::warn;

/// Longest line kept. A frame containing a longer line is dropped whole.
pub const MAX_LINE_LEN: usize = 256 * 1024;

/// One dispatched server-sent event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    /// Frames without an event name (or named `message`) are the ones a plain
    /// `onmessage` listener receives
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of the line being read, never more than `MAX_LINE_LEN`
    line: Vec<u8>,
    /// The last byte was a CR, so an LF right after it ends nothing
    after_cr: bool,
    /// The current line went over the limit
    line_too_long: bool,
    /// The current frame lost a line and must not be dispatched
    frame_dropped: bool,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed a chunk of the body and collect every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();

        for &byte in chunk {
            if std::mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }

            match byte {
                b'\n' | b'\r' => {
                    self.after_cr = byte == b'\r';
                    if let Some(frame) = self.end_line() {
                        frames.push(frame);
                    }
                }
                _ if self.line.len() >= MAX_LINE_LEN => self.line_too_long = true,
                _ => self.line.push(byte),
            }
        }
        frames
    }

    fn end_line(&mut self) -> Option<SseFrame> {
        let raw = std::mem::take(&mut self.line);
        if std::mem::take(&mut self.line_too_long) {
            warn!(limit = MAX_LINE_LEN, "dropping event with an oversized line");
            self.frame_dropped = true;
            return None;
        }

        let text = String::from_utf8_lossy(&raw);
        self.process_line(&text)
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            // comment / keep-alive
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data);
        if std::mem::take(&mut self.frame_dropped) || data.is_empty() {
            return None;
        }

        Some(SseFrame {
            event,
            data: data.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push(b"data: {\"type\":\"NEW_TURN\"}\n\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"type\":\"NEW_TURN\"}");
        assert!(frames[0].is_message());
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"da").is_empty());
        assert!(decoder.push(b"ta: hel").is_empty());
        assert!(decoder.push(b"lo\r\n").is_empty());

        let frames = decoder.push(b"\r\ndata: second\n\n");
        let data: Vec<_> = frames.iter().map(|f| f.data.as_str()).collect();
        assert_eq!(data, vec!["hello", "second"]);
    }

    #[test]
    fn test_multiline_data_and_fields() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push(b"id: 7\nevent: update\ndata: line one\ndata:line two\n\n");

        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("update".to_string()),
                data: "line one\nline two".to_string(),
            }]
        );
        assert!(!frames[0].is_message());
    }

    #[test]
    fn test_comments_and_empty_frames_are_skipped() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push(b": keep-alive\n\nretry: 1000\n\nevent: ping\n\ndata: x\n\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "x");
        // an event name without data does not leak into the next frame
        assert_eq!(frames[0].event, None);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        let bytes = "data: pierre-feuille-ciseaux ✂\n\n".as_bytes();
        let (head, tail) = bytes.split_at(bytes.len() - 3);

        assert!(decoder.push(head).is_empty());
        let frames = decoder.push(tail);
        assert_eq!(frames[0].data, "pierre-feuille-ciseaux ✂");
    }

    #[test]
    fn test_lone_carriage_returns_end_lines() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push(b"data: one\r\rdata: two\r");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "one");

        // a CR at the end of a chunk followed by LF in the next is one line break
        assert!(decoder.push(b"\n").is_empty());
        let frames = decoder.push(b"\r\n");
        assert_eq!(frames[0].data, "two");
    }

    #[test]
    fn test_oversized_line_drops_its_frame() {
        let mut decoder = SseDecoder::default();
        let long = vec![b'x'; MAX_LINE_LEN + 10];

        assert!(decoder.push(b"data: ").is_empty());
        assert!(decoder.push(&long).is_empty());
        assert!(decoder.push(&long).is_empty());
        assert!(decoder.line.len() <= MAX_LINE_LEN);

        let frames = decoder.push(b"\ndata: tail\n\ndata: next\n\n");
        let data: Vec<_> = frames.iter().map(|f| f.data.as_str()).collect();
        assert_eq!(data, vec!["next"]);
    }
}
