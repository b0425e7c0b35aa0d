//! Character-accumulating incremental JSON parser (spec.md §4.B).
//!
//! Vendor CLIs sometimes emit a single JSON object across multiple
//! newline-delimited writes; splitting on lines is not sufficient, so
//! [`StreamParser`] accumulates raw bytes and attempts a speculative parse
//! on every append.

use serde_json::Value;
use tracing::{debug, warn};

/// Hard cap on the accumulation buffer. Exceeding it without producing a
/// complete frame is a [`ParseError`].
const MAX_BUFFER_BYTES: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("stream buffer exceeded {MAX_BUFFER_BYTES} bytes without a complete frame")]
    BufferOverflow,
}

/// Running counters exposed by [`StreamParser::stats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserStats {
    pub total_bytes: u64,
    pub attempts: u64,
    pub successes: u64,
}

impl ParserStats {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

/// Byte-accumulating speculative JSON parser.
pub struct StreamParser {
    buffer: Vec<u8>,
    stats: ParserStats,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamParser {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            stats: ParserStats::default(),
        }
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Append `bytes` and attempt a speculative parse of the whole buffer.
    ///
    /// Returns `Ok(Some(value))` on a complete frame (buffer cleared),
    /// `Ok(None)` when the buffer is either incomplete or was discarded
    /// after a structural parse error, and `Err` only when the buffer
    /// exceeds the accumulation cap.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Option<Value>, ParseError> {
        self.buffer.extend_from_slice(bytes);
        self.stats.total_bytes += bytes.len() as u64;
        self.try_parse()
    }

    /// Attempt one final parse of whatever remains in the buffer at
    /// end-of-stream.
    pub fn flush(&mut self) -> Result<Option<Value>, ParseError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        self.try_parse()
    }

    fn try_parse(&mut self) -> Result<Option<Value>, ParseError> {
        if self.buffer.len() > MAX_BUFFER_BYTES {
            self.buffer.clear();
            return Err(ParseError::BufferOverflow);
        }

        self.stats.attempts += 1;
        match serde_json::from_slice::<Value>(&self.buffer) {
            Ok(value) => {
                self.stats.successes += 1;
                self.buffer.clear();
                Ok(Some(value))
            }
            Err(e) if e.is_eof() => {
                // Truncated input — keep accumulating.
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, bytes = self.buffer.len(), "discarding malformed stream frame");
                self.buffer.clear();
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_parses_immediately() {
        let mut p = StreamParser::new();
        let v = p.feed(br#"{"type":"assistant"}"#).unwrap();
        assert!(v.is_some());
        assert_eq!(p.stats().successes, 1);
    }

    /// S2 — parser chunked input: the same frame fed in three slices of
    /// sizes (10, 20, rest) parses identically to one whole-frame feed.
    #[test]
    fn s2_chunked_feed_matches_single_chunk() {
        let frame = br#"{"type":"assistant","content":[{"type":"text","text":"hi"}]}"#;
        let (a, b, c) = (&frame[..10], &frame[10..30], &frame[30..]);

        let mut chunked = StreamParser::new();
        assert!(chunked.feed(a).unwrap().is_none());
        assert!(chunked.feed(b).unwrap().is_none());
        let chunked_result = chunked.feed(c).unwrap().unwrap();

        let mut whole = StreamParser::new();
        let whole_result = whole.feed(frame).unwrap().unwrap();

        assert_eq!(chunked_result, whole_result);
    }

    #[test]
    fn byte_by_byte_feed_eventually_parses() {
        let frame = br#"{"type":"result","subtype":"success"}"#;
        let mut p = StreamParser::new();
        let mut last = None;
        for b in frame {
            last = p.feed(&[*b]).unwrap();
        }
        assert!(last.is_some());
    }

    #[test]
    fn structural_error_discards_buffer_and_recovers() {
        let mut p = StreamParser::new();
        assert!(p.feed(b"not json at all }").unwrap().is_none());
        assert_eq!(p.buffer_size(), 0);
        let v = p.feed(br#"{"type":"user","content":"hi"}"#).unwrap();
        assert!(v.is_some());
    }

    #[test]
    fn overflow_past_cap_errors_and_clears() {
        let mut p = StreamParser::new();
        let huge = vec![b'['; MAX_BUFFER_BYTES + 1];
        let err = p.feed(&huge).unwrap_err();
        assert!(matches!(err, ParseError::BufferOverflow));
        assert_eq!(p.buffer_size(), 0);
    }

    #[test]
    fn flush_parses_trailing_buffer() {
        let mut p = StreamParser::new();
        assert!(p.feed(br#"{"type":"result""#).unwrap().is_none());
        // Not valid JSON on its own, flush should not panic and returns None.
        assert!(p.flush().unwrap().is_none());
    }

    #[test]
    fn success_rate_tracks_attempts_and_successes() {
        let mut p = StreamParser::new();
        p.feed(br#"{"type":"user","content":"a"}"#).unwrap();
        p.feed(b"garbage}}}").unwrap();
        assert_eq!(p.stats().attempts, 2);
        assert_eq!(p.stats().successes, 1);
        assert_eq!(p.stats().success_rate(), 0.5);
    }
}
