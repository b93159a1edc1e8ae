// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frames a raw byte stream into newline-terminated records.
//!
//! Bytes arrive from the serial port in arbitrary-sized reads that may
//! split a record across two reads, or deliver several records in one
//! read. `LineCodec` absorbs that and yields complete, trimmed lines only.

/// The magic boot banner the radio module prints on power-up; never a
/// real record.
const BOOT_BANNER: &str = "Power on";

/// Accumulates bytes across reads and splits them into trimmed lines.
#[derive(Default)]
pub struct LineCodec {
    buf: Vec<u8>,
}

impl LineCodec {
    #[must_use]
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feeds newly read bytes into the accumulator and returns every
    /// complete line found, in order. Partial data at the end is kept for
    /// the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let trimmed = line.trim_end_matches('\r').trim();
            if trimmed.is_empty() || trimmed == BOOT_BANNER {
                continue;
            }
            lines.push(trimmed.to_string());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::LineCodec;

    #[test]
    fn splits_single_read_into_multiple_lines() {
        let mut codec = LineCodec::new();
        let lines = codec.feed(b"FILE:a.txt:1:3\r\nACK:0\r\n");
        assert_eq!(lines, vec!["FILE:a.txt:1:3", "ACK:0"]);
    }

    #[test]
    fn joins_a_line_split_across_two_reads() {
        let mut codec = LineCodec::new();
        assert!(codec.feed(b"ACK:").is_empty());
        let lines = codec.feed(b"5\r\n");
        assert_eq!(lines, vec!["ACK:5"]);
    }

    #[test]
    fn drops_boot_banner_and_blank_lines() {
        let mut codec = LineCodec::new();
        let lines = codec.feed(b"Power on\r\n\r\nACK:1\r\n");
        assert_eq!(lines, vec!["ACK:1"]);
    }

    #[test]
    fn replaces_malformed_utf8() {
        let mut codec = LineCodec::new();
        let mut bytes = b"chat:".to_vec();
        bytes.push(0xff);
        bytes.extend_from_slice(b"\r\n");
        let lines = codec.feed(&bytes);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("chat:"));
    }

    #[test]
    fn retains_partial_line_across_many_feeds() {
        let mut codec = LineCodec::new();
        assert!(codec.feed(b"DA").is_empty());
        assert!(codec.feed(b"TA:1:29b1:").is_empty());
        let lines = codec.feed(b"aGk=\r\n");
        assert_eq!(lines, vec!["DATA:1:29b1:aGk="]);
    }
}
