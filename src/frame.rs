//! Newline framing for the watch response body.

use bytes::{Bytes, BytesMut};

/// Accumulates body chunks and hands out complete newline-terminated messages.
///
/// Chunk boundaries are arbitrary: one chunk may carry several messages, and one
/// message may span several chunks. Anything after the last newline stays buffered
/// until a later chunk completes it.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
    // Bytes at the front of `buf` already known to contain no newline.
    scanned: usize,
}

impl FrameBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of body bytes.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Removes and returns every complete message, without its trailing newline.
    ///
    /// Returns an empty vector when no complete message is buffered.
    pub fn extract_ready_messages(&mut self) -> Vec<Bytes> {
        let mut messages = Vec::new();

        while let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            let mut line = self.buf.split_to(end + 1);
            line.truncate(end);
            messages.push(line.freeze());
            self.scanned = 0;
        }

        self.scanned = self.buf.len();
        messages
    }

    /// Number of buffered bytes not yet returned as a message.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether no partial message is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discards any buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }
}
