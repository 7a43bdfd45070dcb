//! Allocator context.
//!
//! A [`FastAllocator`] owns an ordered list of regions, the flat allocator
//! array, the heap fallback, and the global byte accounting. Requests are
//! routed to the bucket whose element size is the smallest that fits the
//! payload plus header; anything beyond the last region takes the metered
//! heap path. All lookup tables are built at initialization and read-only
//! afterwards, so allocation and free take no context-wide lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::error::{Error, ReclaimOutcome};
use crate::pool::{ObjectHooks, TrunkHooks};

use super::array::AllocatorArray;
use super::buf::{BlockHeader, FastBuf, HEADER_SIZE};
use super::region::{Region, RegionConfig, build_region, default_regions};

/// Sentinel for "no reclaim has run yet".
const RECLAIM_NEVER: u64 = u64::MAX;

/// Shared byte accounting, also serving as the trunk growth gate.
///
/// `alloc_bytes` counts bytes currently charged to live blocks;
/// `malloc_bytes` counts bytes committed to trunk memory (and heap-fallback
/// blocks). Both move with atomic adds so concurrent allocate/free never
/// race on accounting.
pub(crate) struct Accounting {
    alloc_bytes: AtomicI64,
    malloc_bytes: AtomicI64,
    byte_budget: i64,
    malloc_bytes_limit: i64,
}

impl Accounting {
    fn new(byte_budget: i64, malloc_bytes_limit: i64) -> Self {
        Self {
            alloc_bytes: AtomicI64::new(0),
            malloc_bytes: AtomicI64::new(0),
            byte_budget,
            malloc_bytes_limit,
        }
    }

    fn alloc_bytes(&self) -> i64 {
        self.alloc_bytes.load(Ordering::Relaxed)
    }

    fn malloc_bytes(&self) -> i64 {
        self.malloc_bytes.load(Ordering::Relaxed)
    }

    fn charge(&self, bytes: i64) {
        self.alloc_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn discharge(&self, bytes: i64) {
        self.alloc_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }
}

impl TrunkHooks for Accounting {
    fn check(&self, growth_bytes: usize) -> Result<(), Error> {
        if self.byte_budget == 0 {
            return Ok(());
        }

        let growth = growth_bytes as i64;
        let outstanding = self.alloc_bytes();
        if outstanding + growth > self.byte_budget {
            warn!(
                outstanding,
                growth,
                budget = self.byte_budget,
                "rejecting growth: byte budget exceeded"
            );
            return Err(Error::BudgetExceeded {
                outstanding,
                growth,
                budget: self.byte_budget,
            });
        }

        let committed = self.malloc_bytes();
        if committed + growth > self.malloc_bytes_limit {
            warn!(
                committed,
                growth,
                limit = self.malloc_bytes_limit,
                "rejecting growth: commit ceiling exceeded"
            );
            return Err(Error::CommitCeilingExceeded {
                committed,
                growth,
                limit: self.malloc_bytes_limit,
            });
        }

        Ok(())
    }

    fn notify(&self, delta_bytes: i64) {
        self.malloc_bytes.fetch_add(delta_bytes, Ordering::Relaxed);
    }
}

/// Snapshot of a context's global accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextStats {
    /// Bytes currently charged to live blocks.
    pub alloc_bytes: i64,
    /// Bytes committed to trunk memory and heap-fallback blocks.
    pub malloc_bytes: i64,
    /// Configured budget for outstanding bytes (0 = unlimited).
    pub byte_budget: i64,
    /// Derived ceiling for committed bytes (0 = unlimited).
    pub malloc_bytes_limit: i64,
    /// Bucket allocators plus the heap fallback.
    pub allocator_count: usize,
}

/// Size-classed allocator context.
pub struct FastAllocator {
    regions: Vec<Region>,
    array: AllocatorArray,
    accounting: Arc<Accounting>,
    object_hooks: ObjectHooks,
    obj_size: usize,
    extra_size: usize,
    expect_usage_ratio: f64,
    reclaim_interval: Option<Duration>,
    epoch: Instant,
    last_reclaim: AtomicU64,
}

impl FastAllocator {
    /// Creates a context over the default five-region size-class ladder.
    ///
    /// Equivalent to [`FastAllocator::with_regions`] with
    /// [`default_regions`], no per-object reserve, and no object callbacks.
    pub fn new(
        prefix: &str,
        byte_budget: u64,
        expect_usage_ratio: f64,
        reclaim_interval: Option<Duration>,
    ) -> Result<Self, Error> {
        Self::with_regions(
            prefix,
            0,
            ObjectHooks::none(),
            &default_regions(),
            byte_budget,
            expect_usage_ratio,
            reclaim_interval,
        )
    }

    /// Creates a context from an ordered region list.
    ///
    /// `obj_size` reserves extra bytes ahead of every payload for caller
    /// metadata; `byte_budget` caps outstanding bytes (0 = unlimited);
    /// `expect_usage_ratio` (defaulting to 0.80 when out of (0.01, 1.00])
    /// lets committed trunk memory over-provision to
    /// `byte_budget / ratio`; `reclaim_interval` rate-limits the reclaim
    /// controller, with `None` disabling automatic reclaim on pool
    /// exhaustion.
    ///
    /// Regions are validated in order and built one by one; the first
    /// violation or failure aborts initialization.
    pub fn with_regions(
        prefix: &str,
        obj_size: usize,
        object_hooks: ObjectHooks,
        regions: &[RegionConfig],
        byte_budget: u64,
        expect_usage_ratio: f64,
        reclaim_interval: Option<Duration>,
    ) -> Result<Self, Error> {
        if regions.is_empty() {
            error!("no regions configured");
            return Err(Error::EmptyRegions);
        }

        let ratio = if (0.01..=1.00).contains(&expect_usage_ratio) {
            expect_usage_ratio
        } else {
            0.80
        };
        let byte_budget = byte_budget as i64;
        let malloc_bytes_limit = if byte_budget == 0 {
            0
        } else {
            (byte_budget as f64 / ratio) as i64
        };

        let accounting = Arc::new(Accounting::new(byte_budget, malloc_bytes_limit));
        let hooks: Arc<dyn TrunkHooks> = Arc::clone(&accounting) as Arc<dyn TrunkHooks>;
        let extra_size = HEADER_SIZE + obj_size;

        let mut array = AllocatorArray::new();
        let mut built = Vec::with_capacity(regions.len());
        let mut previous_end = 0;
        for config in regions {
            config.validate(previous_end)?;
            previous_end = config.end;
            built.push(build_region(
                config,
                extra_size,
                prefix,
                &hooks,
                &object_hooks,
                &mut array,
            ));
        }

        array.check_capacity(1);
        array.register_fallback();

        Ok(Self {
            regions: built,
            array,
            accounting,
            object_hooks,
            obj_size,
            extra_size,
            expect_usage_ratio: ratio,
            reclaim_interval,
            epoch: Instant::now(),
            last_reclaim: AtomicU64::new(RECLAIM_NEVER),
        })
    }

    /// Bucket allocators plus the heap fallback.
    #[must_use]
    pub fn allocator_count(&self) -> usize {
        self.array.len()
    }

    /// Bytes currently charged to live blocks.
    #[must_use]
    pub fn alloc_bytes(&self) -> i64 {
        self.accounting.alloc_bytes()
    }

    /// Bytes committed to trunk memory and heap-fallback blocks.
    #[must_use]
    pub fn malloc_bytes(&self) -> i64 {
        self.accounting.malloc_bytes()
    }

    /// Snapshot of the global accounting.
    #[must_use]
    pub fn stats(&self) -> ContextStats {
        ContextStats {
            alloc_bytes: self.accounting.alloc_bytes(),
            malloc_bytes: self.accounting.malloc_bytes(),
            byte_budget: self.accounting.byte_budget,
            malloc_bytes_limit: self.accounting.malloc_bytes_limit,
            allocator_count: self.array.len(),
        }
    }

    /// Allocates a block with `bytes` of usable payload.
    ///
    /// Returns `None` when the byte budget, the commit ceiling, or the
    /// underlying pool/heap is exhausted (after at most one reclaim retry).
    pub fn alloc(&self, bytes: usize) -> Option<FastBuf> {
        let requested = self.extra_size.checked_add(bytes)?;
        let mut charged = requested;
        let index = self.route(&mut charged);
        let slot = self.array.get(index)?;

        let storage = if let Some(pool) = &slot.pool {
            match pool.alloc_one() {
                Some(storage) => storage,
                None => {
                    if self.reclaim_interval.is_none() {
                        return None;
                    }
                    let ReclaimOutcome::Reclaimed(reclaimed) = self.retry_reclaim() else {
                        return None;
                    };
                    if reclaimed < pool.trunk_bytes() as u64 {
                        return None;
                    }
                    pool.alloc_one()?
                }
            }
        } else {
            // Heap fallback: no trunk hook fires for raw heap blocks, so the
            // budget check and the commit accounting run here directly.
            self.accounting.check(charged).ok()?;
            let mut storage = vec![0u8; charged - HEADER_SIZE].into_boxed_slice();
            self.accounting.notify(charged as i64);
            self.object_hooks.run_init(&mut storage);
            storage
        };

        let header = BlockHeader {
            allocator_index: index as u32,
            magic: slot.magic,
            charged_bytes: charged as u64,
        };
        self.accounting.charge(charged as i64);
        Some(FastBuf::new(header, storage, self.obj_size + bytes))
    }

    /// Releases a block back to its producing allocator.
    ///
    /// A block whose header fails validation (allocator index out of range,
    /// or magic number not matching the indexed allocator) is logged and
    /// dropped without touching any pool or counter: leaking it is safer
    /// than freeing into the wrong pool.
    pub fn free(&self, buf: FastBuf) {
        let (header, storage) = buf.into_parts();
        let index = header.allocator_index as usize;

        let Some(slot) = self.array.get(index) else {
            error!(
                index,
                allocator_count = self.array.len(),
                "invalid allocator index on free"
            );
            return;
        };
        if header.magic != slot.magic {
            error!(
                expected = slot.magic,
                actual = header.magic,
                index,
                "magic number mismatch on free"
            );
            return;
        }

        self.accounting.discharge(header.charged_bytes as i64);
        if let Some(pool) = &slot.pool {
            pool.free_one(storage);
        } else {
            self.accounting.notify(-(header.charged_bytes as i64));
            let mut storage = storage;
            self.object_hooks.run_destroy(&mut storage);
        }
    }

    /// Allocates a block and fills it with a copy of `src`.
    pub fn memdup(&self, src: &[u8]) -> Option<FastBuf> {
        let Some(mut buf) = self.alloc(src.len()) else {
            error!(len = src.len(), "memdup: allocation failed");
            return None;
        };
        buf[..src.len()].copy_from_slice(src);
        Some(buf)
    }

    /// Sweeps every pool for idle trunks when utilization is low.
    ///
    /// Rate-limited: only one caller per `reclaim_interval` window runs the
    /// sweep; the rest see [`ReclaimOutcome::TooSoon`]. When the usage ratio
    /// (`alloc_bytes / malloc_bytes`) is already at or above the expected
    /// ratio, or nothing idle was found, returns
    /// [`ReclaimOutcome::NothingToDo`].
    pub fn retry_reclaim(&self) -> ReclaimOutcome {
        if !self.try_claim_reclaim_window() {
            return ReclaimOutcome::TooSoon;
        }

        let malloc_bytes = self.accounting.malloc_bytes();
        if malloc_bytes == 0 {
            return ReclaimOutcome::NothingToDo;
        }
        let outstanding = self.accounting.alloc_bytes();
        if outstanding as f64 / malloc_bytes as f64 >= self.expect_usage_ratio {
            return ReclaimOutcome::NothingToDo;
        }

        let mut total: u64 = 0;
        for slot in self.array.iter() {
            if let Some(pool) = &slot.pool {
                let trunks = pool.reclaim(0);
                total += (trunks * pool.trunk_bytes()) as u64;
            }
        }
        debug!(reclaimed_bytes = total, "reclaim sweep finished");

        if total > 0 {
            ReclaimOutcome::Reclaimed(total)
        } else {
            ReclaimOutcome::NothingToDo
        }
    }

    /// Claims the current reclaim window.
    ///
    /// The winner moves the shared timestamp forward with a single
    /// compare-exchange; concurrent losers and too-early callers both get
    /// `false`.
    fn try_claim_reclaim_window(&self) -> bool {
        let now = self.epoch.elapsed().as_millis() as u64;
        let interval = self
            .reclaim_interval
            .map_or(0, |interval| interval.as_millis() as u64);

        let last = self.last_reclaim.load(Ordering::Acquire);
        if last != RECLAIM_NEVER && last.saturating_add(interval) > now {
            return false;
        }
        self.last_reclaim
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Picks the allocator for an adjusted byte count, rounding it up to the
    /// chosen bucket's element size in place.
    fn route(&self, charged: &mut usize) -> usize {
        for region in &self.regions {
            if *charged <= region.end {
                if region.bucket_count == 1 {
                    *charged = region.end;
                    return region.first_slot;
                }
                let rounded = (*charged + region.pad_mask) & !region.pad_mask;
                *charged = rounded;
                return region.first_slot + (rounded - region.start) / region.step - 1;
            }
        }
        self.array.len() - 1
    }
}
