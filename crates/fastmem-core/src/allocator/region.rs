//! Size-class regions.
//!
//! A region covers a contiguous byte-size interval `[start, end)` subdivided
//! into buckets of width `step`; each bucket is backed by its own trunk pool.
//! Regions must tile the size axis from zero without gaps, and a multi-bucket
//! region's step must be a power of two aligned to both bounds so requests
//! round up with a mask instead of a division.

use std::sync::Arc;
use tracing::error;

use crate::error::Error;
use crate::pool::{ObjectHooks, TrunkHooks, TrunkPool};

use super::array::AllocatorArray;

/// Caller-supplied region descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionConfig {
    /// Inclusive lower bound of the covered byte sizes.
    pub start: usize,
    /// Exclusive upper bound of the covered byte sizes.
    pub end: usize,
    /// Bucket width in bytes.
    pub step: usize,
    /// Elements committed per trunk growth for each bucket's pool.
    pub elements_per_trunk: usize,
}

impl RegionConfig {
    /// Creates a region descriptor.
    #[must_use]
    pub const fn new(start: usize, end: usize, step: usize, elements_per_trunk: usize) -> Self {
        Self {
            start,
            end,
            step,
            elements_per_trunk,
        }
    }

    /// Checks this region against the layout invariants.
    ///
    /// `previous_end` is the exclusive end of the preceding region (zero for
    /// the first). Violations are logged with the expected and actual values
    /// at the point of detection.
    pub(crate) fn validate(&self, previous_end: usize) -> Result<(), Error> {
        if self.start != previous_end {
            error!(
                start = self.start,
                previous_end, "invalid region start: does not touch previous end"
            );
            return Err(Error::RegionGap {
                start: self.start,
                previous_end,
            });
        }
        if self.start >= self.end {
            error!(start = self.start, end = self.end, "invalid region bounds");
            return Err(Error::InvalidBounds {
                start: self.start,
                end: self.end,
            });
        }
        let span = self.end - self.start;
        if self.step == 0 || self.step > span {
            error!(step = self.step, span, "invalid region step");
            return Err(Error::InvalidStep {
                step: self.step,
                span,
            });
        }
        if span / self.step > 1 {
            if !self.step.is_power_of_two() {
                error!(step = self.step, "invalid region step: expected power of 2");
                return Err(Error::StepNotPowerOfTwo { step: self.step });
            }
            if self.start % self.step != 0 {
                error!(
                    start = self.start,
                    step = self.step,
                    "invalid region start: must be multiple of step"
                );
                return Err(Error::MisalignedStart {
                    start: self.start,
                    step: self.step,
                });
            }
            if self.end % self.step != 0 {
                error!(
                    end = self.end,
                    step = self.step,
                    "invalid region end: must be multiple of step"
                );
                return Err(Error::MisalignedEnd {
                    end: self.end,
                    step: self.step,
                });
            }
        }
        Ok(())
    }
}

/// The default small/medium-object size-class ladder.
///
/// Requests whose adjusted size exceeds 64KiB always take the heap fallback.
#[must_use]
pub fn default_regions() -> [RegionConfig; 5] {
    [
        RegionConfig::new(0, 256, 8, 4096),
        RegionConfig::new(256, 1024, 16, 1024),
        RegionConfig::new(1024, 4096, 64, 256),
        RegionConfig::new(4096, 16384, 256, 64),
        RegionConfig::new(16384, 65536, 1024, 16),
    ]
}

/// A built region: validated bounds plus the flat-array slots of its buckets.
#[derive(Debug)]
pub(crate) struct Region {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) step: usize,
    pub(crate) pad_mask: usize,
    pub(crate) bucket_count: usize,
    pub(crate) first_slot: usize,
}

/// Builds a region's bucket pools and registers them into the flat array.
///
/// A single-bucket region is widened by `extra_size` so its one element size
/// still covers the stated payload range: the step grows when the region
/// starts at zero, the start otherwise, and the end follows in both cases.
pub(crate) fn build_region(
    config: &RegionConfig,
    extra_size: usize,
    prefix: &str,
    hooks: &Arc<dyn TrunkHooks>,
    object_hooks: &ObjectHooks,
    array: &mut AllocatorArray,
) -> Region {
    let mut start = config.start;
    let mut end = config.end;
    let mut step = config.step;
    let pad_mask = step - 1;
    let bucket_count = (end - start) / step;

    array.check_capacity(bucket_count);

    if bucket_count == 1 {
        if start == 0 {
            step += extra_size;
        } else {
            start += extra_size;
        }
        end += extra_size;
    }

    let first_slot = array.len();
    let mut element_size = start + step;
    while element_size <= end {
        let pool = TrunkPool::new(
            format!("{prefix}-{element_size}"),
            element_size,
            config.elements_per_trunk,
            0,
            object_hooks.clone(),
            Some(Arc::clone(hooks)),
        );
        array.register_pool(pool);
        element_size += step;
    }

    Region {
        start,
        end,
        step,
        pad_mask,
        bucket_count,
        first_slot,
    }
}
