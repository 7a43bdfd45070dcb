//! Size-classed allocation.
//!
//! Routes byte-size requests through ordered regions of fixed-width buckets,
//! each backed by its own trunk pool, with a metered heap fallback for
//! anything larger than the last region. Global byte usage is tracked
//! against a configured budget, and idle pool memory is reclaimed when
//! utilization drops below target.

mod array;

pub mod buf;
pub mod context;
pub mod region;

pub use buf::{FastBuf, HEADER_SIZE};
pub use context::{ContextStats, FastAllocator};
pub use region::{RegionConfig, default_regions};
