//! Inbound reassembly.

use super::error::ReassemblyError;
use super::header::{TransportHeader, next_seq};

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Accumulating {
        buffer: Vec<u8>,
        last_seq: u8,
    },
}

/// Rebuilds application messages from transport segments.
///
/// A message is delivered only if its segments arrive as FIR, then strictly
/// consecutive sequence numbers, then FIN. A FIR while accumulating starts
/// over; every other violation discards the partial message.
#[derive(Debug)]
pub struct Reassembler {
    state: State,
    max_size: usize,
}

impl Reassembler {
    /// Create a reassembler that rejects messages larger than `max_size`.
    pub fn new(max_size: usize) -> Self {
        Self {
            state: State::Idle,
            max_size,
        }
    }

    /// True when no message is in progress.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// Drop any partial message.
    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    /// Feed one segment (transport header plus data).
    ///
    /// Returns the complete message when `segment` carries FIN.
    pub fn push(&mut self, segment: &[u8]) -> Result<Option<Vec<u8>>, ReassemblyError> {
        let (&first, data) = segment
            .split_first()
            .ok_or(ReassemblyError::EmptySegment)?;
        let header = TransportHeader::from_byte(first);

        let mut buffer = match std::mem::take(&mut self.state) {
            State::Accumulating { .. } if header.fir => {
                tracing::debug!(%header, "FIR while accumulating, restarting message");
                Vec::new()
            }
            State::Accumulating { buffer, last_seq } => {
                let expected = next_seq(last_seq);
                if header.seq != expected {
                    return Err(ReassemblyError::Sequence {
                        expected,
                        actual: header.seq,
                    });
                }
                buffer
            }
            State::Idle if header.fir => Vec::new(),
            State::Idle => return Err(ReassemblyError::NoFirstSegment(header.seq)),
        };

        buffer.extend_from_slice(data);
        if buffer.len() > self.max_size {
            return Err(ReassemblyError::Overflow { max: self.max_size });
        }

        if header.fin {
            Ok(Some(buffer))
        } else {
            self.state = State::Accumulating {
                buffer,
                last_seq: header.seq,
            };
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(fir: bool, fin: bool, seq: u8, data: &[u8]) -> Vec<u8> {
        let mut s = vec![TransportHeader::new(fir, fin, seq).to_byte()];
        s.extend_from_slice(data);
        s
    }

    #[test]
    fn test_single_segment_message() {
        let mut rx = Reassembler::new(2048);
        assert_eq!(rx.push(&seg(true, true, 0, b"abc")), Ok(Some(b"abc".to_vec())));
        assert!(rx.is_idle());
    }

    #[test]
    fn test_multi_segment_message() {
        let mut rx = Reassembler::new(2048);
        assert_eq!(rx.push(&seg(true, false, 10, b"ab")), Ok(None));
        assert!(!rx.is_idle());
        assert_eq!(rx.push(&seg(false, false, 11, b"cd")), Ok(None));
        assert_eq!(rx.push(&seg(false, true, 12, b"ef")), Ok(Some(b"abcdef".to_vec())));
        assert!(rx.is_idle());
    }

    #[test]
    fn test_sequence_wraps() {
        let mut rx = Reassembler::new(2048);
        rx.push(&seg(true, false, 63, b"x")).unwrap();
        assert_eq!(rx.push(&seg(false, true, 0, b"y")), Ok(Some(b"xy".to_vec())));
    }

    #[test]
    fn test_fir_restarts_message() {
        let mut rx = Reassembler::new(2048);
        rx.push(&seg(true, false, 0, b"stale")).unwrap();
        assert_eq!(rx.push(&seg(true, true, 7, b"fresh")), Ok(Some(b"fresh".to_vec())));
    }

    #[test]
    fn test_sequence_gap_discards() {
        let mut rx = Reassembler::new(2048);
        rx.push(&seg(true, false, 0, b"a")).unwrap();
        assert_eq!(
            rx.push(&seg(false, true, 2, b"c")),
            Err(ReassemblyError::Sequence { expected: 1, actual: 2 })
        );
        assert!(rx.is_idle());

        // The late segment that would have completed it is now orphaned.
        assert_eq!(
            rx.push(&seg(false, true, 1, b"b")),
            Err(ReassemblyError::NoFirstSegment(1))
        );
    }

    #[test]
    fn test_non_fir_while_idle() {
        let mut rx = Reassembler::new(2048);
        assert_eq!(
            rx.push(&seg(false, true, 4, b"x")),
            Err(ReassemblyError::NoFirstSegment(4))
        );
    }

    #[test]
    fn test_empty_segment() {
        let mut rx = Reassembler::new(2048);
        rx.push(&seg(true, false, 0, b"a")).unwrap();
        assert_eq!(rx.push(&[]), Err(ReassemblyError::EmptySegment));
        // An empty link payload does not disturb the message in progress.
        assert_eq!(rx.push(&seg(false, true, 1, b"b")), Ok(Some(b"ab".to_vec())));
    }

    #[test]
    fn test_overflow_discards() {
        let mut rx = Reassembler::new(4);
        rx.push(&seg(true, false, 0, b"abc")).unwrap();
        assert_eq!(
            rx.push(&seg(false, true, 1, b"de")),
            Err(ReassemblyError::Overflow { max: 4 })
        );
        assert!(rx.is_idle());
    }

    #[test]
    fn test_segmenter_output_reassembles() {
        use crate::transport::Segmenter;
        use rand::{Rng, SeedableRng};

        let mut rng = rand::rngs::StdRng::seed_from_u64(0xF1F0);
        let mut rx = Reassembler::new(4096);
        for _ in 0..200 {
            let len = rng.gen_range(1..=4096);
            let capacity = rng.gen_range(1..=249);
            let message: Vec<u8> = (0..len).map(|_| rng.r#gen()).collect();

            let mut delivered = None;
            for segment in Segmenter::new(message.clone(), capacity) {
                assert!(delivered.is_none());
                delivered = rx.push(&segment).unwrap();
            }
            assert_eq!(delivered, Some(message));
        }
    }
}
