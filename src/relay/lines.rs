//! Line reassembly for the upstream response body.
//!
//! Body chunks arrive on arbitrary TCP boundaries. [`LineBuffer`] buffers raw
//! bytes across chunks and hands back complete lines only, so a JSON payload
//! split mid-way is never parsed in pieces.

/// Default cap on a single line, in bytes.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Byte buffer that reassembles newline-delimited lines.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    max_line_bytes: usize,
    /// Set while discarding the remainder of an oversized line.
    discarding: bool,
}

impl LineBuffer {
    /// Create an empty buffer that drops lines longer than `max_line_bytes`.
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_bytes,
            discarding: false,
        }
    }

    /// Append a chunk and return every line it completes, in order.
    ///
    /// Lines are split on `\n`, stripped of a trailing `\r` and surrounding
    /// whitespace. Blank lines and lines longer than `max_line_bytes` are
    /// dropped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = bytes;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.discarding {
                self.discarding = false;
                self.buffer.clear();
                continue;
            }

            if self.buffer.len() + head.len() > self.max_line_bytes {
                tracing::warn!(
                    line_bytes = self.buffer.len() + head.len(),
                    max_line_bytes = self.max_line_bytes,
                    "Upstream line exceeds size limit, discarding"
                );
                self.buffer.clear();
                continue;
            }

            self.buffer.extend_from_slice(head);
            let raw = std::mem::take(&mut self.buffer);
            if let Some(line) = decode_line(raw) {
                lines.push(line);
            }
        }

        if !self.discarding {
            self.buffer.extend_from_slice(rest);
            if self.buffer.len() > self.max_line_bytes {
                tracing::warn!(
                    buffered = self.buffer.len(),
                    max_line_bytes = self.max_line_bytes,
                    "Upstream line exceeds size limit, discarding"
                );
                self.buffer.clear();
                self.discarding = true;
            }
        }

        lines
    }

    /// Return the final line if the body ended without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        decode_line(raw)
    }
}

fn decode_line(raw: Vec<u8>) -> Option<String> {
    match String::from_utf8(raw) {
        Ok(text) => {
            let line = text.trim();
            (!line.is_empty()).then(|| line.to_string())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Skipping upstream line that is not valid UTF-8");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHUNK: &str = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#;

    #[test]
    fn test_single_chunk_multiple_lines() {
        let mut buf = LineBuffer::new(DEFAULT_MAX_LINE_BYTES);
        let raw = format!("{CHUNK}\n\n{CHUNK}\n\n");
        let lines = buf.push(raw.as_bytes());
        assert_eq!(lines, vec![CHUNK.to_string(), CHUNK.to_string()]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut buf = LineBuffer::new(DEFAULT_MAX_LINE_BYTES);
        let raw = format!("{CHUNK}\n");
        let (a, b) = raw.as_bytes().split_at(17);

        assert!(buf.push(a).is_empty());
        assert_eq!(buf.push(b), vec![CHUNK.to_string()]);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let mut buf = LineBuffer::new(DEFAULT_MAX_LINE_BYTES);
        let raw = "data: caf\u{e9}\n".as_bytes();
        // Split inside the two-byte encoding of é
        let (a, b) = raw.split_at(10);

        assert!(buf.push(a).is_empty());
        assert_eq!(buf.push(b), vec!["data: caf\u{e9}".to_string()]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut buf = LineBuffer::new(DEFAULT_MAX_LINE_BYTES);
        let raw = format!("{CHUNK}\r\n\r\n{CHUNK}\r\n");
        assert_eq!(
            buf.push(raw.as_bytes()),
            vec![CHUNK.to_string(), CHUNK.to_string()]
        );
    }

    #[test]
    fn test_unterminated_final_line() {
        let mut buf = LineBuffer::new(DEFAULT_MAX_LINE_BYTES);
        assert!(buf.push(b"data: [DONE]").is_empty());
        assert_eq!(buf.finish(), Some("data: [DONE]".to_string()));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn test_invalid_utf8_line_skipped() {
        let mut buf = LineBuffer::new(DEFAULT_MAX_LINE_BYTES);
        let mut raw = vec![0xff, 0xfe, b'\n'];
        raw.extend_from_slice(b"ok\n");
        assert_eq!(buf.push(&raw), vec!["ok".to_string()]);
    }

    #[test]
    fn test_oversized_line_discarded() {
        let mut buf = LineBuffer::new(64);
        assert!(buf.push(&[b'x'; 100]).is_empty());
        // Rest of the oversized line is still dropped
        assert!(buf.push(b"yyyy\n").is_empty());
        // The next line is processed normally
        assert_eq!(buf.push(b"after\n"), vec!["after".to_string()]);
    }

    #[test]
    fn test_oversized_line_within_one_chunk_discarded() {
        let mut buf = LineBuffer::new(64);
        let mut raw = vec![b'x'; 10_000];
        raw.extend_from_slice(b"\nnext\n");
        assert_eq!(buf.push(&raw), vec!["next".to_string()]);
    }

    #[test]
    fn test_oversized_line_straddling_chunks_discarded() {
        let mut buf = LineBuffer::new(64);
        assert!(buf.push(&[b'x'; 60]).is_empty());

        let mut raw = vec![b'y'; 500];
        raw.extend_from_slice(b"\nnext\n");
        assert_eq!(buf.push(&raw), vec!["next".to_string()]);
    }

    #[test]
    fn test_line_at_limit_kept() {
        let mut buf = LineBuffer::new(8);
        assert!(buf.push(b"abcd").is_empty());
        assert_eq!(buf.push(b"efgh\n"), vec!["abcdefgh".to_string()]);
    }

    #[test]
    fn test_oversized_unterminated_line_not_returned() {
        let mut buf = LineBuffer::new(8);
        assert!(buf.push(b"0123456789").is_empty());
        assert_eq!(buf.finish(), None);
    }
}
