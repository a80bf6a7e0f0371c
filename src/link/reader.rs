//! Streaming frame reader.
//!
//! The physical channel delivers bytes in arbitrary pieces. [`FrameReader`]
//! buffers them, hunts for the `0x05 0x64` start sequence, and yields one
//! result per candidate frame:
//!
//! - a bad header (CRC or length) discards only the first start byte, so a
//!   real frame hiding inside noise is still found;
//! - a bad data block or unknown function discards the whole frame, since the
//!   header already proved its length.

use super::frame::{FrameError, LinkFrame, RawHeader};
use crate::core::{LINK_HEADER_SIZE, START_BYTE_1, START_BYTE_2};

/// Incremental FT3 frame parser.
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: Vec<u8>,
    /// Bytes dropped while hunting for a start sequence.
    discarded: usize,
}

impl FrameReader {
    /// Create an empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the channel.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes skipped while resynchronising.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Extract the next frame, or the next reason a candidate was dropped.
    ///
    /// Returns `None` when more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Result<LinkFrame, FrameError>> {
        self.sync_to_start();
        if self.buffer.len() < LINK_HEADER_SIZE {
            return None;
        }

        let raw = match RawHeader::parse(&self.buffer) {
            Ok(raw) => raw,
            Err(e) => {
                self.skip(1);
                return Some(Err(e));
            }
        };

        let total = raw.frame_len();
        if self.buffer.len() < total {
            return None;
        }

        let result = LinkFrame::from_raw(raw, &self.buffer[LINK_HEADER_SIZE..total]);
        self.buffer.drain(..total);
        Some(result)
    }

    /// Drop bytes up to the next possible start sequence.
    fn sync_to_start(&mut self) {
        let start = self
            .buffer
            .windows(2)
            .position(|w| w[0] == START_BYTE_1 && w[1] == START_BYTE_2);
        match start {
            Some(0) => {}
            Some(offset) => self.skip(offset),
            None => {
                // Keep a trailing 0x05: it may be the first half of a start sequence.
                let keep = usize::from(self.buffer.last() == Some(&START_BYTE_1));
                let drop = self.buffer.len() - keep;
                self.skip(drop);
            }
        }
    }

    fn skip(&mut self, count: usize) {
        self.buffer.drain(..count);
        self.discarded += count;
    }
}
