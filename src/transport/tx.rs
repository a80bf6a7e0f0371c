//! Outbound segmentation.

use super::header::{TransportHeader, next_seq};
use crate::core::{INITIAL_SEQUENCE, TRANSPORT_HEADER_SIZE};

/// Splits one application message into transport segments.
///
/// A message of length L with segment capacity S yields ⌈L/S⌉ segments. The
/// first carries FIR, the last FIN, and sequence numbers start from
/// [`INITIAL_SEQUENCE`] and increment mod 64.
#[derive(Debug)]
pub struct Segmenter {
    message: Vec<u8>,
    capacity: usize,
    offset: usize,
    seq: u8,
}

impl Segmenter {
    /// Prepare `message` for segmentation into chunks of `capacity` bytes.
    ///
    /// `message` must be non-empty and `capacity` non-zero; the transport
    /// layer checks both before constructing a segmenter.
    pub fn new(message: Vec<u8>, capacity: usize) -> Self {
        debug_assert!(!message.is_empty());
        debug_assert!(capacity > 0);
        Self {
            message,
            capacity,
            offset: 0,
            seq: INITIAL_SEQUENCE,
        }
    }

    /// Number of segments the message produces.
    pub fn segment_count(len: usize, capacity: usize) -> usize {
        len.div_ceil(capacity)
    }

    /// Segments not yet produced.
    pub fn remaining(&self) -> usize {
        Self::segment_count(self.message.len() - self.offset, self.capacity)
    }

    /// True once every segment has been produced.
    pub fn is_done(&self) -> bool {
        self.offset >= self.message.len()
    }
}

impl Iterator for Segmenter {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if self.is_done() {
            return None;
        }
        let end = (self.offset + self.capacity).min(self.message.len());
        let header = TransportHeader::new(self.offset == 0, end == self.message.len(), self.seq);

        let mut segment = Vec::with_capacity(TRANSPORT_HEADER_SIZE + end - self.offset);
        segment.push(header.to_byte());
        segment.extend_from_slice(&self.message[self.offset..end]);

        self.offset = end;
        self.seq = next_seq(self.seq);
        Some(segment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for Segmenter {}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(segments: &[Vec<u8>]) -> Vec<TransportHeader> {
        segments
            .iter()
            .map(|s| TransportHeader::from_byte(s[0]))
            .collect()
    }

    #[test]
    fn test_single_segment() {
        let segments: Vec<_> = Segmenter::new(vec![1, 2, 3], 249).collect();
        assert_eq!(segments, vec![vec![0xC0, 1, 2, 3]]);
    }

    #[test]
    fn test_exact_multiple() {
        let segments: Vec<_> = Segmenter::new(vec![0xAA; 20], 10).collect();
        assert_eq!(segments.len(), 2);
        assert_eq!(
            headers(&segments),
            vec![
                TransportHeader::new(true, false, 0),
                TransportHeader::new(false, true, 1),
            ]
        );
        assert!(segments.iter().all(|s| s.len() == 11));
    }

    #[test]
    fn test_partial_last_segment() {
        let message: Vec<u8> = (0..25).collect();
        let segmenter = Segmenter::new(message.clone(), 10);
        assert_eq!(segmenter.len(), 3);

        let segments: Vec<_> = segmenter.collect();
        assert_eq!(segments[2].len(), 6);

        let rebuilt: Vec<u8> = segments.iter().flat_map(|s| s[1..].to_vec()).collect();
        assert_eq!(rebuilt, message);
    }

    #[test]
    fn test_sequence_wraps_within_message() {
        let segments: Vec<_> = Segmenter::new(vec![0; 70], 1).collect();
        assert_eq!(segments.len(), 70);
        let seqs: Vec<u8> = headers(&segments).iter().map(|h| h.seq).collect();
        assert_eq!(seqs[63], 63);
        assert_eq!(seqs[64], 0);
        assert_eq!(seqs[69], 5);
    }

    #[test]
    fn test_segment_count() {
        assert_eq!(Segmenter::segment_count(1, 249), 1);
        assert_eq!(Segmenter::segment_count(249, 249), 1);
        assert_eq!(Segmenter::segment_count(250, 249), 2);
        assert_eq!(Segmenter::segment_count(2048, 249), 9);
    }
}
