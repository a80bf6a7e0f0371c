//! Serialized execution context and timer service.
//!
//! Every layer of every logical link schedules work exclusively through an
//! [`Executor`]. The executor is an explicit single-consumer queue: producers
//! on any thread push tasks, one loop pops and runs them to completion in
//! post order. Nothing in the stack yields mid-task, so at most one piece of
//! stack logic is ever running for a given executor.
//!
//! ```text
//!  producer threads           Executor                  loop
//!  ────────────────    ┌───────────────────────┐    ─────────────
//!  post(task) ───────▶ │ queue: t1 t2 t3 ...   │ ─▶ run t1, t2, ...
//!  start(d, cb) ─────▶ │ timers: min-heap      │ ─▶ due timers are
//!                      └───────────────────────┘    appended to queue
//! ```

mod queue;
mod timer;

pub use queue::{Executor, Task};
pub use timer::{TimerHandle, TimerId};
