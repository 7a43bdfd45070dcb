//! Pooled element allocation.
//!
//! A [`trunk::TrunkPool`] hands out fixed-size elements carved from trunks:
//! large batches of elements committed in one step. Freed elements go back on
//! a freelist for reuse; idle capacity can be reclaimed in whole-trunk units.
//! Growth is gated and reported through caller-injected [`hooks`].

pub mod hooks;
pub mod trunk;

pub use hooks::{ObjectHooks, TrunkHooks};
pub use trunk::{PoolStats, TrunkPool};
