//! Fixed-size pooled element allocator.
//!
//! Elements are committed in whole-trunk batches of `elements_per_trunk`
//! buffers. A freed element goes back on the freelist and is handed out again
//! without touching the heap. Reclaim releases idle capacity in whole-trunk
//! units only, so committed-byte accounting always moves in trunk-sized
//! steps.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

use super::hooks::{ObjectHooks, TrunkHooks};

/// Snapshot of a pool's element accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Fixed byte size of every element.
    pub element_size: usize,
    /// Elements committed per trunk growth.
    pub elements_per_trunk: usize,
    /// Trunks currently committed.
    pub trunk_count: usize,
    /// Elements committed (trunks × elements per trunk).
    pub total_elements: usize,
    /// Elements currently handed out.
    pub used_elements: usize,
    /// Elements sitting on the freelist.
    pub free_elements: usize,
}

struct PoolInner {
    free: Vec<Box<[u8]>>,
    total_elements: usize,
    used_elements: usize,
    trunk_count: usize,
}

/// Growable pool of fixed-size byte elements.
pub struct TrunkPool {
    name: String,
    element_size: usize,
    elements_per_trunk: usize,
    element_limit: usize,
    hooks: Option<Arc<dyn TrunkHooks>>,
    object_hooks: ObjectHooks,
    inner: Mutex<PoolInner>,
}

impl TrunkPool {
    /// Creates an empty pool.
    ///
    /// `element_limit` caps the total number of committed elements;
    /// zero means unlimited. No memory is committed until the first
    /// allocation.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        element_size: usize,
        elements_per_trunk: usize,
        element_limit: usize,
        object_hooks: ObjectHooks,
        hooks: Option<Arc<dyn TrunkHooks>>,
    ) -> Self {
        Self {
            name: name.into(),
            element_size: element_size.max(1),
            elements_per_trunk: elements_per_trunk.max(1),
            element_limit,
            hooks,
            object_hooks,
            inner: Mutex::new(PoolInner {
                free: Vec::new(),
                total_elements: 0,
                used_elements: 0,
                trunk_count: 0,
            }),
        }
    }

    /// Pool name, used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed byte size of every element.
    #[must_use]
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Bytes committed by one trunk growth.
    #[must_use]
    pub fn trunk_bytes(&self) -> usize {
        self.element_size * self.elements_per_trunk
    }

    /// Hands out one element, growing by a trunk if the freelist is empty.
    ///
    /// Returns `None` when the element limit is reached or the injected
    /// growth check rejects the trunk. Element contents are whatever the
    /// previous user left behind; only freshly committed elements have run
    /// the init callback.
    pub fn alloc_one(&self) -> Option<Box<[u8]>> {
        let mut inner = self.inner.lock();
        if inner.free.is_empty() {
            self.grow_trunk(&mut inner)?;
        }
        let element = inner.free.pop()?;
        inner.used_elements += 1;
        Some(element)
    }

    /// Returns an element to the freelist.
    ///
    /// An element of the wrong size is dropped rather than pooled; mixing it
    /// into the freelist would hand short buffers to later callers.
    pub fn free_one(&self, element: Box<[u8]>) {
        if element.len() != self.element_size {
            warn!(
                pool = %self.name,
                expected = self.element_size,
                actual = element.len(),
                "element size mismatch on free, dropping"
            );
            return;
        }

        let mut inner = self.inner.lock();
        match inner.used_elements.checked_sub(1) {
            Some(next) => inner.used_elements = next,
            None => {
                warn!(pool = %self.name, "free without matching alloc");
            }
        }
        inner.free.push(element);
    }

    /// Releases idle capacity in whole-trunk units.
    ///
    /// Keeps at least `keep_idle_trunks` trunks' worth of free elements.
    /// Returns the number of trunks released; committed-byte accounting is
    /// notified one trunk at a time.
    pub fn reclaim(&self, keep_idle_trunks: usize) -> usize {
        let mut inner = self.inner.lock();
        let idle_trunks = inner.free.len() / self.elements_per_trunk;
        let reclaimable = idle_trunks.saturating_sub(keep_idle_trunks);

        for _ in 0..reclaimable {
            for _ in 0..self.elements_per_trunk {
                if let Some(mut element) = inner.free.pop() {
                    self.object_hooks.run_destroy(&mut element);
                }
            }
            inner.trunk_count -= 1;
            inner.total_elements -= self.elements_per_trunk;
            if let Some(hooks) = &self.hooks {
                hooks.notify(-(self.trunk_bytes() as i64));
            }
        }

        reclaimable
    }

    /// Snapshot of element accounting.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        PoolStats {
            element_size: self.element_size,
            elements_per_trunk: self.elements_per_trunk,
            trunk_count: inner.trunk_count,
            total_elements: inner.total_elements,
            used_elements: inner.used_elements,
            free_elements: inner.free.len(),
        }
    }

    fn grow_trunk(&self, inner: &mut PoolInner) -> Option<()> {
        if self.element_limit > 0
            && inner.total_elements + self.elements_per_trunk > self.element_limit
        {
            warn!(
                pool = %self.name,
                limit = self.element_limit,
                total = inner.total_elements,
                "element limit reached"
            );
            return None;
        }

        let growth = self.trunk_bytes();
        if let Some(hooks) = &self.hooks {
            hooks.check(growth).ok()?;
        }

        inner.free.reserve(self.elements_per_trunk);
        for _ in 0..self.elements_per_trunk {
            let mut element = vec![0u8; self.element_size].into_boxed_slice();
            self.object_hooks.run_init(&mut element);
            inner.free.push(element);
        }
        inner.trunk_count += 1;
        inner.total_elements += self.elements_per_trunk;
        if let Some(hooks) = &self.hooks {
            hooks.notify(growth as i64);
        }
        Some(())
    }
}

impl Drop for TrunkPool {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        for element in &mut inner.free {
            self.object_hooks.run_destroy(element);
        }
        if let Some(hooks) = &self.hooks {
            let committed = inner.trunk_count * self.trunk_bytes();
            if committed > 0 {
                hooks.notify(-(committed as i64));
            }
        }
    }
}
