//! Error types shared across the stack.
//!
//! Data-path errors (bad frames, broken reassembly) live next to the layer
//! that detects them and never cross into upper layers. The types here are the
//! ones surfaced to code that assembles or operates a stack.

use thiserror::Error;

use crate::link::LinkRoute;
use crate::transport::TransportError;

/// Invalid link or router configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Address falls in the reserved range.
    #[error("address {0:#06x} is reserved")]
    ReservedAddress(u16),

    /// Max payload outside the range a frame can carry.
    #[error("max payload {0} out of range (2..=250)")]
    PayloadSize(usize),

    /// Confirmation timeout must be non-zero.
    #[error("link timeout must be non-zero")]
    ZeroTimeout,

    /// Transmit queue depth must be non-zero.
    #[error("transmit queue depth must be non-zero")]
    ZeroQueueDepth,

    /// Router size parameter must be non-zero.
    #[error("{0} must be non-zero")]
    ZeroSize(&'static str),

    /// Route already registered on this router.
    #[error("route {0} already registered")]
    DuplicateRoute(LinkRoute),
}

/// Top-level stack errors.
#[derive(Debug, Error)]
pub enum StackError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Message rejected by the transport layer.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Transmit queue is full; retry later.
    #[error("transmit queue full ({depth} segments pending)")]
    TxQueueFull {
        /// Configured queue depth.
        depth: usize,
    },

    /// `start` called on a running stack.
    #[error("stack already started")]
    AlreadyStarted,

    /// Operation needs a started stack.
    #[error("stack not started")]
    NotStarted,

    /// Stack has been shut down.
    #[error("stack shut down")]
    ShutDown,

    /// Link id does not belong to this stack or was removed.
    #[error("unknown link")]
    UnknownLink,

    /// I/O error opening a physical channel.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl StackError {
    /// Check if the caller may retry the same operation later.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, StackError::TxQueueFull { .. })
    }

    /// Check if this error happened while assembling the stack.
    pub fn is_config(&self) -> bool {
        matches!(self, StackError::Config(_))
    }
}

/// Result type for stack operations.
pub type StackResult<T> = Result<T, StackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backpressure_classification() {
        assert!(StackError::TxQueueFull { depth: 10 }.is_backpressure());
        assert!(!StackError::ShutDown.is_backpressure());
        assert!(!StackError::NotStarted.is_backpressure());
    }

    #[test]
    fn test_config_classification() {
        let err: StackError = ConfigError::DuplicateRoute(LinkRoute::new(1, 1024)).into();
        assert!(err.is_config());
        assert!(err.to_string().contains("already registered"));
        assert!(!StackError::UnknownLink.is_config());
    }
}
