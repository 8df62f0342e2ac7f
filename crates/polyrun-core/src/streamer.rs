//! Turns raw bytes from a child's output pipe into ordered text chunks.

use crate::events::OutputChunk;

/// Splits a byte stream into chunks.
///
/// Every complete line becomes its own chunk. Whatever follows the last
/// newline of a read is emitted right away as well, so a prompt printed
/// without a trailing newline shows up before the program blocks on input.
/// Only a UTF-8 sequence cut in half by a read boundary is held back.
#[derive(Debug, Default)]
pub struct OutputStreamer {
    pending: Vec<u8>,
    next_seq: u64,
}

impl OutputStreamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the bytes of one read and take the chunks they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<OutputChunk> {
        self.pending.extend_from_slice(bytes);

        let mut texts = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            texts.push(String::from_utf8_lossy(&line).into_owned());
        }

        let ready = decodable_prefix(&self.pending);
        if ready > 0 {
            let partial: Vec<u8> = self.pending.drain(..ready).collect();
            texts.push(String::from_utf8_lossy(&partial).into_owned());
        }

        texts.into_iter().map(|text| self.chunk(text)).collect()
    }

    /// End of stream: flush anything still held back.
    pub fn finish(&mut self) -> Option<OutputChunk> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).into_owned();
        Some(self.chunk(text))
    }

    fn chunk(&mut self, text: String) -> OutputChunk {
        let seq = self.next_seq;
        self.next_seq += 1;
        OutputChunk { seq, text }
    }
}

/// Length of the prefix of `bytes` that can be decoded now.
fn decodable_prefix(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Ok(_) => bytes.len(),
        // Incomplete trailing sequence: wait for the rest.
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        // Genuinely invalid bytes never become valid; emit them lossily.
        Err(_) => bytes.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: Vec<OutputChunk>) -> Vec<String> {
        chunks.into_iter().map(|c| c.text).collect()
    }

    #[test]
    fn test_lines_are_forwarded_individually() {
        let mut s = OutputStreamer::new();
        assert_eq!(texts(s.push(b"a\nb\nc\n")), vec!["a\n", "b\n", "c\n"]);
        assert!(s.finish().is_none());
    }

    #[test]
    fn test_prompt_without_newline_is_forwarded() {
        let mut s = OutputStreamer::new();
        assert_eq!(texts(s.push(b"Enter name: ")), vec!["Enter name: "]);
        assert_eq!(texts(s.push(b"Bob\n")), vec!["Bob\n"]);
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut s = OutputStreamer::new();
        assert_eq!(texts(s.push(b"hel")), vec!["hel"]);
        assert_eq!(texts(s.push(b"lo\nwor")), vec!["lo\n", "wor"]);
    }

    #[test]
    fn test_split_utf8_sequence_is_held_back() {
        let bytes = "é\n".as_bytes();
        let mut s = OutputStreamer::new();
        assert!(s.push(&bytes[..1]).is_empty());
        assert_eq!(texts(s.push(&bytes[1..])), vec!["é\n"]);
    }

    #[test]
    fn test_finish_flushes_incomplete_sequence() {
        let bytes = "▶".as_bytes();
        let mut s = OutputStreamer::new();
        assert!(s.push(&bytes[..2]).is_empty());
        let last = s.finish().unwrap();
        assert_eq!(last.text, "\u{FFFD}");
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let mut s = OutputStreamer::new();
        let mut chunks = s.push(b"1\n2\n");
        chunks.extend(s.push(b"3"));
        let seqs: Vec<_> = chunks.iter().map(|c| c.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }
}
