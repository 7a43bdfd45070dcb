//! # fastmem-core
//!
//! A user-space memory subsystem for long-running server processes: a
//! size-classed pooled allocator layered over trunk-based element pools,
//! plus an intrusive blocking queue for handing objects between
//! producer/consumer threads.
//!
//! Byte-size requests route through ordered [`allocator::RegionConfig`]
//! regions of fixed-width buckets, each backed by its own
//! [`pool::TrunkPool`]; oversized requests take a metered heap fallback.
//! Global usage is tracked atomically against a configured budget, and idle
//! pool memory is reclaimed when utilization drops below target.
//!
//! No `unsafe` code outside the queue's intrusive linkage.

#![deny(unsafe_code)]

pub mod allocator;
pub mod error;
pub mod pool;
#[allow(unsafe_code)]
pub mod queue;
