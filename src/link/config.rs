//! Per-link configuration and route identity.

use std::fmt;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::core::{
    ConfigError, DEFAULT_LINK_TIMEOUT, DEFAULT_NUM_RETRY, MAX_LINK_PAYLOAD,
    RESERVED_ADDRESS_START, TRANSPORT_HEADER_SIZE,
};

/// Which end of the conversation this station is.
///
/// The master is the primary-direction station: every frame it sends carries
/// the DIR bit. Outstations send with DIR cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LinkRole {
    /// Master station (DIR set).
    Master,
    /// Outstation (DIR clear).
    Outstation,
}

impl LinkRole {
    /// DIR bit value for frames sent by this role.
    pub fn dir(self) -> bool {
        matches!(self, LinkRole::Master)
    }
}

/// Configuration for one logical link. Immutable once the stack is built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkConfig {
    /// Master or outstation.
    pub role: LinkRole,
    /// Our link address.
    pub local_addr: u16,
    /// Peer link address.
    pub remote_addr: u16,
    /// Send user data as CONFIRMED_USER_DATA and require a link reset first.
    pub use_confirms: bool,
    /// Retries for a confirmed frame before giving up.
    pub num_retry: u32,
    /// How long to wait for a link confirmation.
    pub timeout: Duration,
    /// Maximum user data per frame (transport header included).
    pub max_payload: usize,
}

impl LinkConfig {
    /// Create a configuration with default framing parameters.
    pub fn new(role: LinkRole, local_addr: u16, remote_addr: u16) -> Self {
        Self {
            role,
            local_addr,
            remote_addr,
            use_confirms: false,
            num_retry: DEFAULT_NUM_RETRY,
            timeout: DEFAULT_LINK_TIMEOUT,
            max_payload: MAX_LINK_PAYLOAD,
        }
    }

    /// Enable or disable confirmed user data.
    pub fn with_confirms(mut self, enabled: bool) -> Self {
        self.use_confirms = enabled;
        self
    }

    /// Set the number of retries for confirmed frames.
    pub fn with_num_retry(mut self, retries: u32) -> Self {
        self.num_retry = retries;
        self
    }

    /// Set the confirmation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum user data per frame.
    pub fn with_max_payload(mut self, size: usize) -> Self {
        self.max_payload = size;
        self
    }

    /// Route under which inbound frames for this link arrive.
    pub fn route(&self) -> LinkRoute {
        LinkRoute::new(self.remote_addr, self.local_addr)
    }

    /// Application bytes carried by each segment.
    pub fn segment_capacity(&self) -> usize {
        self.max_payload - TRANSPORT_HEADER_SIZE
    }

    /// Check the configuration for values the stack cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for addr in [self.local_addr, self.remote_addr] {
            if addr >= RESERVED_ADDRESS_START {
                return Err(ConfigError::ReservedAddress(addr));
            }
        }
        if !(TRANSPORT_HEADER_SIZE + 1..=MAX_LINK_PAYLOAD).contains(&self.max_payload) {
            return Err(ConfigError::PayloadSize(self.max_payload));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Address pair identifying one logical link on a shared channel.
///
/// Inbound frames are routed by (source, destination): a frame from
/// `remote` to `local` belongs to the link configured with that pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkRoute {
    /// Peer address (source of inbound frames).
    pub remote: u16,
    /// Our address (destination of inbound frames).
    pub local: u16,
}

impl LinkRoute {
    /// Create a route.
    pub fn new(remote: u16, local: u16) -> Self {
        Self { remote, local }
    }

    /// Route an inbound frame with the given addresses belongs to.
    pub fn inbound(source: u16, destination: u16) -> Self {
        Self::new(source, destination)
    }
}

impl fmt::Display for LinkRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.remote, self.local)
    }
}
