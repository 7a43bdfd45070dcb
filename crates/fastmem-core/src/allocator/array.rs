//! Flat allocator array.
//!
//! Every bucket pool across all regions is registered here in order, followed
//! by the single heap-fallback entry. A block's header records its slot index
//! so free-time lookup is O(1). The array is built once during context
//! initialization and read-only afterwards.

use crate::pool::TrunkPool;

/// One slot in the flat array: a bucket's pool, or the heap fallback.
pub(crate) struct BucketAllocator {
    /// Corruption/misuse guard copied into every block allocated here.
    pub(crate) magic: u32,
    /// Backing pool; `None` marks the heap fallback.
    pub(crate) pool: Option<TrunkPool>,
}

impl BucketAllocator {
    pub(crate) fn pooled(&self) -> bool {
        self.pool.is_some()
    }
}

/// Ordered, append-only list of every allocator in a context.
pub(crate) struct AllocatorArray {
    slots: Vec<BucketAllocator>,
}

impl AllocatorArray {
    pub(crate) fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Ensures backing capacity for `additional` more slots.
    ///
    /// The first growth picks the smallest tier from
    /// 128/256/512/1024 that fits (or twice the target beyond that);
    /// later growths double until sufficient. Growth only happens during
    /// context construction, so the schedule bounds reallocation to a
    /// handful of copies.
    pub(crate) fn check_capacity(&mut self, additional: usize) {
        let target = self.slots.len() + additional;
        if self.slots.capacity() >= target {
            return;
        }

        let capacity = if self.slots.capacity() == 0 {
            match target {
                t if t < 128 => 128,
                t if t < 256 => 256,
                t if t < 512 => 512,
                t if t < 1024 => 1024,
                t => 2 * t,
            }
        } else {
            let mut capacity = self.slots.capacity();
            while capacity < target {
                capacity *= 2;
            }
            capacity
        };

        self.slots.reserve_exact(capacity - self.slots.len());
    }

    /// Registers a bucket pool, returning its slot index.
    pub(crate) fn register_pool(&mut self, pool: TrunkPool) -> usize {
        self.register(Some(pool))
    }

    /// Registers the heap-fallback entry, returning its slot index.
    pub(crate) fn register_fallback(&mut self) -> usize {
        self.register(None)
    }

    fn register(&mut self, pool: Option<TrunkPool>) -> usize {
        let index = self.slots.len();
        self.slots.push(BucketAllocator {
            magic: rand::random::<u32>(),
            pool,
        });
        index
    }

    pub(crate) fn get(&self, index: usize) -> Option<&BucketAllocator> {
        self.slots.get(index)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &BucketAllocator> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{ObjectHooks, TrunkPool};

    fn test_pool(size: usize) -> TrunkPool {
        TrunkPool::new(format!("t-{size}"), size, 4, 0, ObjectHooks::none(), None)
    }

    #[test]
    fn first_growth_uses_smallest_tier() {
        let mut array = AllocatorArray::new();
        array.check_capacity(10);
        assert!(array.slots.capacity() >= 128);
    }

    #[test]
    fn large_first_growth_doubles_target() {
        let mut array = AllocatorArray::new();
        array.check_capacity(1500);
        assert!(array.slots.capacity() >= 3000);
    }

    #[test]
    fn subsequent_growth_doubles() {
        let mut array = AllocatorArray::new();
        array.check_capacity(10);
        let first = array.slots.capacity();
        array.check_capacity(first + 1);
        assert!(array.slots.capacity() >= 2 * first);
    }

    #[test]
    fn registration_assigns_sequential_indices() {
        let mut array = AllocatorArray::new();
        array.check_capacity(3);
        assert_eq!(array.register_pool(test_pool(8)), 0);
        assert_eq!(array.register_pool(test_pool(16)), 1);
        assert_eq!(array.register_fallback(), 2);
        assert_eq!(array.len(), 3);
        assert!(array.get(0).unwrap().pooled());
        assert!(!array.get(2).unwrap().pooled());
        assert!(array.get(3).is_none());
    }

    #[test]
    fn magic_numbers_differ_between_slots() {
        let mut array = AllocatorArray::new();
        for _ in 0..16 {
            array.register_pool(test_pool(8));
        }
        let first = array.get(0).unwrap().magic;
        let all_same = (1..16).all(|i| array.get(i).unwrap().magic == first);
        assert!(!all_same);
    }
}
