//! Transport layer errors.

use thiserror::Error;

/// Outbound message rejected before segmentation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Zero-length messages cannot be segmented.
    #[error("empty message")]
    EmptyMessage,

    /// Message exceeds the configured maximum.
    #[error("message of {size} bytes exceeds maximum of {max}")]
    MessageTooLarge {
        /// Message size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// Reason an inbound segment was discarded.
///
/// Never propagated to the upper layer; logged and dropped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyError {
    /// Link payload with no transport header.
    #[error("empty segment")]
    EmptySegment,

    /// Continuation segment with no message in progress.
    #[error("segment without FIR while idle (seq={0})")]
    NoFirstSegment(u8),

    /// Sequence number did not follow the previous segment.
    #[error("sequence error: expected {expected}, got {actual}")]
    Sequence {
        /// Next sequence number expected.
        expected: u8,
        /// Sequence number received.
        actual: u8,
    },

    /// Message grew past the maximum size.
    #[error("reassembled message exceeds {max} bytes")]
    Overflow {
        /// Configured maximum.
        max: usize,
    },
}

impl ReassemblyError {
    /// Check if the partially reassembled message was discarded.
    pub fn discards_partial(&self) -> bool {
        matches!(self, ReassemblyError::Sequence { .. } | ReassemblyError::Overflow { .. })
    }
}
