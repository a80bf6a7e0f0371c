//! Data-link layer: FT3 framing, CRC, addressing and the per-link state machine.

mod config;
pub mod crc;
mod frame;
mod layer;
mod reader;

pub use config::{LinkConfig, LinkRole, LinkRoute};
pub use frame::{FrameError, LinkFrame, LinkFunction, LinkHeader};
pub use layer::{LinkAction, LinkError, LinkLayer};
pub use reader::FrameReader;
