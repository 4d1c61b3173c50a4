/*
[INPUT]:  Raw feed socket bytes, fragmented or coalesced arbitrarily
[OUTPUT]: Complete newline-delimited frames parsed as JSON
[POS]:    Feed layer - wire framing
[UPDATE]: When changing frame delimiting or size limits
*/

use bytes::BytesMut;
use serde_json::Value;

/// Upper bound for a single frame before it is rejected
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;
const RAW_LOG_MAX_BYTES: usize = 1024;

/// One decoded line from a feed
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Json(Value),
    Malformed { raw: String, error: String },
}

/// Accumulates socket reads and yields complete frames only
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    max_frame_bytes: usize,
    /// Bytes already searched for a delimiter
    scanned: usize,
    /// Dropping the remainder of an oversized frame
    discarding: bool,
}

impl FrameBuffer {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(8 * 1024),
            max_frame_bytes,
            scanned: 0,
            discarding: false,
        }
    }

    /// Buffer to read socket data into
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes held for an incomplete frame
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Next complete frame, or `None` when more data is needed
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let newline = self.buf[self.scanned..]
                .iter()
                .position(|byte| *byte == b'\n')
                .map(|offset| self.scanned + offset);

            let Some(pos) = newline else {
                self.scanned = self.buf.len();
                if self.discarding {
                    self.buf.clear();
                    self.scanned = 0;
                    return None;
                }
                if self.buf.len() > self.max_frame_bytes {
                    let raw = truncate_for_log(&String::from_utf8_lossy(&self.buf), RAW_LOG_MAX_BYTES);
                    self.buf.clear();
                    self.scanned = 0;
                    self.discarding = true;
                    return Some(self.oversized(raw));
                }
                return None;
            };

            let line = self.buf.split_to(pos + 1);
            self.scanned = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }

            let mut line = &line[..pos];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            if line.len() > self.max_frame_bytes {
                let raw = truncate_for_log(&String::from_utf8_lossy(line), RAW_LOG_MAX_BYTES);
                return Some(self.oversized(raw));
            }

            return Some(match serde_json::from_slice::<Value>(line) {
                Ok(value) => Frame::Json(value),
                Err(err) => Frame::Malformed {
                    raw: truncate_for_log(&String::from_utf8_lossy(line), RAW_LOG_MAX_BYTES),
                    error: err.to_string(),
                },
            });
        }
    }

    fn oversized(&self, raw: String) -> Frame {
        Frame::Malformed {
            raw,
            error: format!("frame exceeds {} bytes", self.max_frame_bytes),
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

pub(crate) fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn drain(buffer: &mut FrameBuffer) -> Vec<Frame> {
        std::iter::from_fn(|| buffer.next_frame()).collect()
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::default();
        buffer.extend(b"{\"a\":1}\n");
        assert_eq!(drain(&mut buffer), vec![Frame::Json(json!({"a": 1}))]);
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_fragmented_frame_waits_for_delimiter() {
        let mut buffer = FrameBuffer::default();
        buffer.extend(b"{\"type\":\"pri");
        assert!(buffer.next_frame().is_none());
        buffer.extend(b"ce\",\"data\":{\"i\":");
        assert!(buffer.next_frame().is_none());
        buffer.extend(b"101}}\n");

        assert_eq!(
            drain(&mut buffer),
            vec![Frame::Json(json!({"type": "price", "data": {"i": 101}}))]
        );
    }

    #[test]
    fn test_coalesced_frames_split() {
        let mut buffer = FrameBuffer::default();
        buffer.extend(b"{\"n\":1}\n{\"n\":2}\r\n\n{\"n\":");

        assert_eq!(
            drain(&mut buffer),
            vec![Frame::Json(json!({"n": 1})), Frame::Json(json!({"n": 2}))]
        );
        assert_eq!(buffer.pending_len(), 5);

        buffer.extend(b"3}\n");
        assert_eq!(drain(&mut buffer), vec![Frame::Json(json!({"n": 3}))]);
    }

    #[test]
    fn test_malformed_frame_does_not_block_following_frames() {
        let mut buffer = FrameBuffer::default();
        buffer.extend(b"not json\n{\"ok\":true}\n");

        let frames = drain(&mut buffer);
        assert_eq!(frames.len(), 2);
        assert!(matches!(&frames[0], Frame::Malformed { raw, .. } if raw == "not json"));
        assert_eq!(frames[1], Frame::Json(json!({"ok": true})));
    }

    #[test]
    fn test_oversized_frame_is_discarded_until_delimiter() {
        let mut buffer = FrameBuffer::new(16);
        buffer.extend(b"{\"padding\":\"aaaaaaaaaaaaaaaaaaaa");

        let frame = buffer.next_frame();
        assert!(matches!(frame, Some(Frame::Malformed { ref error, .. }) if error.contains("16 bytes")));
        assert_eq!(buffer.pending_len(), 0);

        buffer.extend(b"aaaa\"}\n{\"a\":1}\n");
        assert_eq!(drain(&mut buffer), vec![Frame::Json(json!({"a": 1}))]);
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("ååå", 3), "å...");
    }
}
