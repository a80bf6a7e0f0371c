//! FT3 link frame encoding and decoding.
//!
//! Wire format:
//! ```text
//! +------+------+-----+------+-----------+-----------+---------+
//! | 0x05 | 0x64 | LEN | CTRL | DEST LE16 | SRC LE16  | CRC LE16|   header (10 bytes)
//! +------+------+-----+------+-----------+-----------+---------+
//! | up to 16 bytes of user data | CRC LE16 |  ... repeated per block
//! +-----------------------------+----------+
//! ```
//!
//! LEN counts CTRL, DEST and SRC (5 bytes) plus the user data, so a frame
//! carries at most 250 bytes of user data.

use thiserror::Error;

use super::crc;
use crate::core::{
    BLOCK_DATA_SIZE, CRC_SIZE, CTRL_DIR, CTRL_FCB, CTRL_FCV_DFC, CTRL_FUNC_MASK, CTRL_PRM,
    LEN_FIELD_OVERHEAD, LINK_HEADER_CRC_SPAN, LINK_HEADER_SIZE, MAX_LINK_PAYLOAD, START_BYTE_1,
    START_BYTE_2,
};

/// Link function codes.
///
/// Primary functions initiate a transaction (PRM set); secondary functions
/// answer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkFunction {
    /// Reset the secondary's frame count state.
    ResetLinkStates,
    /// Test the link, exercising the frame count bit.
    TestLinkStates,
    /// User data requiring an ACK.
    ConfirmedUserData,
    /// User data without confirmation.
    UnconfirmedUserData,
    /// Ask the secondary for its link status.
    RequestLinkStatus,
    /// Positive acknowledgement.
    Ack,
    /// Negative acknowledgement.
    Nack,
    /// Answer to a link status request.
    LinkStatus,
    /// Requested function is not supported.
    NotSupported,
}

impl LinkFunction {
    /// Interpret a function code under the given PRM bit.
    pub fn from_parts(primary: bool, code: u8) -> Option<Self> {
        match (primary, code) {
            (true, 0) => Some(Self::ResetLinkStates),
            (true, 2) => Some(Self::TestLinkStates),
            (true, 3) => Some(Self::ConfirmedUserData),
            (true, 4) => Some(Self::UnconfirmedUserData),
            (true, 9) => Some(Self::RequestLinkStatus),
            (false, 0) => Some(Self::Ack),
            (false, 1) => Some(Self::Nack),
            (false, 11) => Some(Self::LinkStatus),
            (false, 15) => Some(Self::NotSupported),
            _ => None,
        }
    }

    /// The 4-bit function code.
    pub fn code(self) -> u8 {
        match self {
            Self::ResetLinkStates => 0,
            Self::TestLinkStates => 2,
            Self::ConfirmedUserData => 3,
            Self::UnconfirmedUserData => 4,
            Self::RequestLinkStatus => 9,
            Self::Ack => 0,
            Self::Nack => 1,
            Self::LinkStatus => 11,
            Self::NotSupported => 15,
        }
    }

    /// Check if this function initiates a transaction.
    pub fn is_primary(self) -> bool {
        matches!(
            self,
            Self::ResetLinkStates
                | Self::TestLinkStates
                | Self::ConfirmedUserData
                | Self::UnconfirmedUserData
                | Self::RequestLinkStatus
        )
    }

    /// Check if frames with this function carry user data.
    pub fn carries_user_data(self) -> bool {
        matches!(self, Self::ConfirmedUserData | Self::UnconfirmedUserData)
    }
}

/// Decoded link header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkHeader {
    /// Function code (determines PRM).
    pub function: LinkFunction,
    /// DIR bit: set on frames sent by a master.
    pub dir: bool,
    /// Frame count bit (primary frames only).
    pub fcb: bool,
    /// FCV on primary frames, DFC on secondary frames.
    pub fcv_dfc: bool,
    /// Destination address.
    pub destination: u16,
    /// Source address.
    pub source: u16,
}

impl LinkHeader {
    /// Encode the control byte.
    pub fn control(&self) -> u8 {
        let mut ctrl = self.function.code() & CTRL_FUNC_MASK;
        if self.dir {
            ctrl |= CTRL_DIR;
        }
        if self.function.is_primary() {
            ctrl |= CTRL_PRM;
        }
        if self.fcb {
            ctrl |= CTRL_FCB;
        }
        if self.fcv_dfc {
            ctrl |= CTRL_FCV_DFC;
        }
        ctrl
    }

    fn from_control(ctrl: u8, destination: u16, source: u16) -> Result<Self, FrameError> {
        let primary = ctrl & CTRL_PRM != 0;
        let code = ctrl & CTRL_FUNC_MASK;
        let function =
            LinkFunction::from_parts(primary, code).ok_or(FrameError::UnknownFunction {
                primary,
                code,
            })?;
        Ok(Self {
            function,
            dir: ctrl & CTRL_DIR != 0,
            fcb: ctrl & CTRL_FCB != 0,
            fcv_dfc: ctrl & CTRL_FCV_DFC != 0,
            destination,
            source,
        })
    }
}

/// Header fields validated by start bytes, length and CRC, before the control
/// byte is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawHeader {
    pub(crate) user_data_len: usize,
    pub(crate) control: u8,
    pub(crate) destination: u16,
    pub(crate) source: u16,
}

impl RawHeader {
    /// Parse and CRC-check the 10 header bytes.
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < LINK_HEADER_SIZE {
            return Err(FrameError::TooShort {
                expected: LINK_HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        if bytes[0] != START_BYTE_1 || bytes[1] != START_BYTE_2 {
            return Err(FrameError::BadStart(bytes[0], bytes[1]));
        }
        if !crc::is_valid_block(&bytes[..LINK_HEADER_SIZE]) {
            return Err(FrameError::HeaderCrc);
        }
        let len = bytes[2];
        if len < LEN_FIELD_OVERHEAD {
            return Err(FrameError::BadLength(len));
        }
        Ok(Self {
            user_data_len: (len - LEN_FIELD_OVERHEAD) as usize,
            control: bytes[3],
            destination: u16::from_le_bytes([bytes[4], bytes[5]]),
            source: u16::from_le_bytes([bytes[6], bytes[7]]),
        })
    }

    /// Total encoded size of the frame this header announces.
    pub(crate) fn frame_len(&self) -> usize {
        LinkFrame::encoded_len(self.user_data_len)
    }
}

/// One link frame: header plus user data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFrame {
    /// Decoded header.
    pub header: LinkHeader,
    /// User data (empty for link-control frames).
    pub payload: Vec<u8>,
}

impl LinkFrame {
    /// Build a primary frame.
    ///
    /// FCV is set for the functions that use the frame count bit
    /// (confirmed user data and test link states).
    pub fn primary(
        function: LinkFunction,
        dir: bool,
        fcb: bool,
        destination: u16,
        source: u16,
        payload: Vec<u8>,
    ) -> Self {
        debug_assert!(function.is_primary());
        let fcv = matches!(
            function,
            LinkFunction::ConfirmedUserData | LinkFunction::TestLinkStates
        );
        Self {
            header: LinkHeader {
                function,
                dir,
                fcb: fcv && fcb,
                fcv_dfc: fcv,
                destination,
                source,
            },
            payload,
        }
    }

    /// Build a secondary (response) frame.
    pub fn secondary(function: LinkFunction, dir: bool, destination: u16, source: u16) -> Self {
        debug_assert!(!function.is_primary());
        Self {
            header: LinkHeader {
                function,
                dir,
                fcb: false,
                fcv_dfc: false,
                destination,
                source,
            },
            payload: Vec::new(),
        }
    }

    /// Encoded size of a frame carrying `user_data_len` bytes.
    pub fn encoded_len(user_data_len: usize) -> usize {
        let blocks = user_data_len.div_ceil(BLOCK_DATA_SIZE);
        LINK_HEADER_SIZE + user_data_len + blocks * CRC_SIZE
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        if self.payload.len() > MAX_LINK_PAYLOAD {
            return Err(FrameError::PayloadTooLarge(self.payload.len()));
        }

        let mut out = Vec::with_capacity(Self::encoded_len(self.payload.len()));
        out.push(START_BYTE_1);
        out.push(START_BYTE_2);
        out.push(LEN_FIELD_OVERHEAD + self.payload.len() as u8);
        out.push(self.header.control());
        out.extend_from_slice(&self.header.destination.to_le_bytes());
        out.extend_from_slice(&self.header.source.to_le_bytes());
        let header_crc = crc::crc16(&out[..LINK_HEADER_CRC_SPAN]);
        out.extend_from_slice(&header_crc.to_le_bytes());

        for block in self.payload.chunks(BLOCK_DATA_SIZE) {
            out.extend_from_slice(block);
            crc::append_crc(block, &mut out);
        }
        Ok(out)
    }

    /// Parse a complete frame from the start of `bytes`.
    ///
    /// Returns the frame and the number of bytes it occupied.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), FrameError> {
        let raw = RawHeader::parse(bytes)?;
        let total = raw.frame_len();
        if bytes.len() < total {
            return Err(FrameError::TooShort {
                expected: total,
                actual: bytes.len(),
            });
        }
        let frame = Self::from_raw(raw, &bytes[LINK_HEADER_SIZE..total])?;
        Ok((frame, total))
    }

    /// Verify block CRCs of `body` and interpret the control byte.
    pub(crate) fn from_raw(raw: RawHeader, body: &[u8]) -> Result<Self, FrameError> {
        let mut payload = Vec::with_capacity(raw.user_data_len);
        for (index, block) in body.chunks(BLOCK_DATA_SIZE + CRC_SIZE).enumerate() {
            if !crc::is_valid_block(block) {
                return Err(FrameError::BodyCrc { block: index });
            }
            payload.extend_from_slice(&block[..block.len() - CRC_SIZE]);
        }
        let header = LinkHeader::from_control(raw.control, raw.destination, raw.source)?;
        Ok(Self { header, payload })
    }
}

/// Errors that can occur during frame parsing.
///
/// All of them are line noise from the stack's point of view: the frame is
/// dropped and logged, nothing is reported upward.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Not enough bytes.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum expected size.
        expected: usize,
        /// Actual size available.
        actual: usize,
    },

    /// Start bytes are not 0x05 0x64.
    #[error("bad start bytes: 0x{0:02x} 0x{1:02x}")]
    BadStart(u8, u8),

    /// LEN field smaller than the fixed header fields it must cover.
    #[error("bad length field: {0}")]
    BadLength(u8),

    /// Header CRC mismatch.
    #[error("header crc mismatch")]
    HeaderCrc,

    /// Data block CRC mismatch.
    #[error("crc mismatch in data block {block}")]
    BodyCrc {
        /// Zero-based block index.
        block: usize,
    },

    /// Function code not defined for the PRM bit.
    #[error("unknown function code {code} (prm={primary})")]
    UnknownFunction {
        /// PRM bit.
        primary: bool,
        /// Function code.
        code: u8,
    },

    /// Payload exceeds what one frame can carry.
    #[error("payload of {0} bytes exceeds 250")]
    PayloadTooLarge(usize),
}
