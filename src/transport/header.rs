//! One-byte transport segment header.

use std::fmt;

use crate::core::{TRANSPORT_FIN, TRANSPORT_FIR, TRANSPORT_SEQ_MASK};

/// FIR / FIN flags plus a 6-bit sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportHeader {
    /// First segment of a message.
    pub fir: bool,
    /// Final segment of a message.
    pub fin: bool,
    /// Rolling sequence number, 0..=63.
    pub seq: u8,
}

impl TransportHeader {
    /// Create a header. `seq` is reduced mod 64.
    pub fn new(fir: bool, fin: bool, seq: u8) -> Self {
        Self {
            fir,
            fin,
            seq: seq & TRANSPORT_SEQ_MASK,
        }
    }

    /// Decode from the first byte of a segment.
    pub fn from_byte(byte: u8) -> Self {
        Self {
            fir: byte & TRANSPORT_FIR != 0,
            fin: byte & TRANSPORT_FIN != 0,
            seq: byte & TRANSPORT_SEQ_MASK,
        }
    }

    /// Encode to a single byte.
    pub fn to_byte(self) -> u8 {
        let mut byte = self.seq & TRANSPORT_SEQ_MASK;
        if self.fir {
            byte |= TRANSPORT_FIR;
        }
        if self.fin {
            byte |= TRANSPORT_FIN;
        }
        byte
    }
}

/// Sequence number that follows `seq`, mod 64.
pub fn next_seq(seq: u8) -> u8 {
    seq.wrapping_add(1) & TRANSPORT_SEQ_MASK
}

impl fmt::Display for TransportHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}seq={}",
            if self.fir { "FIR " } else { "" },
            if self.fin { "FIN " } else { "" },
            self.seq
        )
    }
}
