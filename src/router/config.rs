//! Router configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::core::{
    ConfigError, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_READ_BUFFER_SIZE, DEFAULT_TX_QUEUE_DEPTH,
};

/// Parameters shared by every link on one physical channel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RouterConfig {
    /// Maximum segments accepted from upper layers and not yet completed.
    /// Sends past this bound are rejected with
    /// [`StackError::TxQueueFull`](crate::core::StackError::TxQueueFull).
    pub tx_queue_depth: usize,
    /// Largest application message, in either direction.
    pub max_message_size: usize,
    /// Size of the buffer used for each channel read.
    pub read_buffer_size: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            tx_queue_depth: DEFAULT_TX_QUEUE_DEPTH,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl RouterConfig {
    /// Set the transmit queue depth.
    pub fn with_tx_queue_depth(mut self, depth: usize) -> Self {
        self.tx_queue_depth = depth;
        self
    }

    /// Set the maximum application message size.
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the channel read buffer size.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Check for values the router cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tx_queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::ZeroSize("max message size"));
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::ZeroSize("read buffer size"));
        }
        Ok(())
    }
}
