//! Cross-thread object handoff.
//!
//! A [`blocking::Queue`] chains caller-owned nodes through a link embedded
//! in the node itself, so a handoff never allocates. Consumers block on a
//! condition variable; producers wake them on the empty-to-non-empty
//! transition, and shutdown wakes them without enqueuing anything.

pub mod blocking;

pub use blocking::{Link, Queue, QueueChain, QueueNode};
