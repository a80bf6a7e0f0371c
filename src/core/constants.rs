//! Protocol constants for the DNP3 link and transport layers.
//!
//! Wire values are fixed by IEEE 1815 and MUST NOT be changed. Defaults are
//! tunable through [`LinkConfig`](crate::link::LinkConfig) and
//! [`RouterConfig`](crate::router::RouterConfig).

use std::time::Duration;

// =============================================================================
// LINK FRAME (FT3)
// =============================================================================

/// First start byte of every link frame.
pub const START_BYTE_1: u8 = 0x05;

/// Second start byte of every link frame.
pub const START_BYTE_2: u8 = 0x64;

/// Header size: start(2) + len(1) + ctrl(1) + dest(2) + src(2) + crc(2).
pub const LINK_HEADER_SIZE: usize = 10;

/// Bytes of the header covered by the header CRC.
pub const LINK_HEADER_CRC_SPAN: usize = 8;

/// The LEN field counts ctrl + dest + src in addition to user data.
pub const LEN_FIELD_OVERHEAD: u8 = 5;

/// User data is split into blocks of at most this many bytes.
pub const BLOCK_DATA_SIZE: usize = 16;

/// Every header and data block is followed by a 16-bit CRC.
pub const CRC_SIZE: usize = 2;

/// Maximum user data carried by a single link frame.
pub const MAX_LINK_PAYLOAD: usize = 250;

/// Maximum encoded frame: header + 250 bytes of data + 16 block CRCs.
pub const MAX_FRAME_SIZE: usize = LINK_HEADER_SIZE + MAX_LINK_PAYLOAD + 16 * CRC_SIZE;

/// Addresses at or above this value are reserved (broadcast, self-address).
pub const RESERVED_ADDRESS_START: u16 = 0xFFF0;

// =============================================================================
// CONTROL FIELD
// =============================================================================

/// Direction bit: set on frames sent by the master.
pub const CTRL_DIR: u8 = 0x80;

/// Primary bit: set on frames that initiate a transaction.
pub const CTRL_PRM: u8 = 0x40;

/// Frame count bit (primary frames).
pub const CTRL_FCB: u8 = 0x20;

/// Frame count valid (primary) / data flow control (secondary).
pub const CTRL_FCV_DFC: u8 = 0x10;

/// Function code bits.
pub const CTRL_FUNC_MASK: u8 = 0x0F;

// =============================================================================
// TRANSPORT SEGMENT
// =============================================================================

/// Transport header: first segment of a message.
pub const TRANSPORT_FIR: u8 = 0x80;

/// Transport header: final segment of a message.
pub const TRANSPORT_FIN: u8 = 0x40;

/// Transport header: 6-bit rolling sequence number.
pub const TRANSPORT_SEQ_MASK: u8 = 0x3F;

/// Size of the transport header carried in each link payload.
pub const TRANSPORT_HEADER_SIZE: usize = 1;

/// Sequence number used for the first segment of every outbound message.
pub const INITIAL_SEQUENCE: u8 = 0;

// =============================================================================
// DEFAULTS
// =============================================================================

/// Default link confirmation timeout.
pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of retries for confirmed frames.
pub const DEFAULT_NUM_RETRY: u32 = 3;

/// Default bound on segments waiting for the physical channel.
pub const DEFAULT_TX_QUEUE_DEPTH: usize = 1000;

/// Default maximum size of a reassembled application message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 2048;

/// Default size of the physical channel read buffer.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;
