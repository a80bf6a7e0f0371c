//! Transport layer: segmentation and reassembly of application messages.
//!
//! Every link payload starts with a one-byte header:
//!
//! ```text
//!   7     6     5..0
//! +-----+-----+--------+
//! | FIR | FIN |  SEQ   |
//! +-----+-----+--------+
//! ```
//!
//! Outbound messages are cut into segments that fit the link's max payload;
//! inbound segments are reassembled and only complete messages move up.

mod error;
mod header;
mod layer;
mod rx;
mod tx;

pub use error::{ReassemblyError, TransportError};
pub use header::{TransportHeader, next_seq};
pub use layer::{TransportAction, TransportLayer};
pub use rx::Reassembler;
pub use tx::Segmenter;
