//! # dnp3-link
//!
//! Link, transport and routing core of a DNP3-style telemetry stack.
//!
//! Many logical links (master/outstation address pairs) share one physical
//! byte channel. The stack frames bytes into addressed, CRC-checked FT3
//! frames, routes inbound frames to the right link, segments and reassembles
//! application messages, and drives all of it from one serialized
//! [`Executor`](executor::Executor) so that every layer transition happens in
//! a single, deterministic order.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Upper layer (application)        │  UpperLayer trait
//! ├─────────────────────────────────────────┤
//! │  Transport: FIR/FIN/SEQ segmentation    │  one per link
//! ├─────────────────────────────────────────┤
//! │  Link: FT3 frames, confirms, FCB        │  one per link
//! ├─────────────────────────────────────────┤
//! │  Router: demux + one frame in flight    │  one per channel
//! ├─────────────────────────────────────────┤
//! │  Physical channel (TCP, serial, ...)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Feature Flags
//!
//! - `tcp` (default): [`connect_tcp`](router::connect_tcp) channel helper
//! - `serde`: `Serialize`/`Deserialize` for the configuration types
//!
//! ## Modules
//!
//! - [`core`](crate::core): constants, error types and the [`UpperLayer`] trait
//! - [`executor`]: serialized task queue and pooled timers
//! - [`link`]: CRC, frame codec, streaming reader, link state machine
//! - [`transport`]: segment header, segmenter, reassembler
//! - [`router`]: route table, transmit arbitration, channel I/O
//! - [`stack`]: builder, stack and per-link handles

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod executor;
pub mod link;
pub mod router;
pub mod stack;
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{ConfigError, StackError, StackResult, UpperLayer};
    pub use crate::executor::{Executor, TimerHandle};
    pub use crate::link::{LinkConfig, LinkRole, LinkRoute};
    #[cfg(feature = "tcp")]
    pub use crate::router::connect_tcp;
    pub use crate::router::{LinkId, RouterConfig, loopback_channel};
    pub use crate::stack::{LinkHandle, Stack, StackBuilder};
}

// Re-export commonly used items at crate root
pub use crate::core::{ConfigError, StackError, StackResult, UpperLayer};
pub use crate::executor::Executor;
pub use crate::link::{LinkConfig, LinkRole, LinkRoute};
pub use crate::router::{LinkId, Router, RouterConfig};
pub use crate::stack::{LinkHandle, Stack, StackBuilder};
