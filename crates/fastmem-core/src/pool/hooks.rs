//! Injected pool callbacks.
//!
//! Pools do not know about budgets; the owner of a pool injects a
//! [`TrunkHooks`] implementation that vetoes trunk growth and observes
//! committed-byte changes. Object lifecycle callbacks are optional and run
//! once per element: init when the element's backing memory is created,
//! destroy before it is released.

use std::fmt;
use std::sync::Arc;

use crate::error::Error;

/// Growth gate and byte-accounting observer for trunk commitment.
///
/// `check` runs before a trunk is committed and may reject the growth.
/// `notify` runs after commitment (positive delta) and after release
/// (negative delta). Both must be safe to call from any allocating thread.
pub trait TrunkHooks: Send + Sync {
    /// Vetoes or admits a prospective trunk growth of `growth_bytes`.
    fn check(&self, growth_bytes: usize) -> Result<(), Error>;

    /// Records a signed change in committed trunk bytes.
    fn notify(&self, delta_bytes: i64);
}

/// Per-object lifecycle callback.
pub type ObjectFn = Arc<dyn Fn(&mut [u8]) + Send + Sync>;

/// Optional object init/destroy callbacks, shared across a pool's elements.
#[derive(Clone, Default)]
pub struct ObjectHooks {
    /// Invoked once when an element's backing memory is created.
    pub init: Option<ObjectFn>,
    /// Invoked once before an element's backing memory is released.
    pub destroy: Option<ObjectFn>,
}

impl ObjectHooks {
    /// Hooks that do nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    pub(crate) fn run_init(&self, obj: &mut [u8]) {
        if let Some(init) = &self.init {
            init(obj);
        }
    }

    pub(crate) fn run_destroy(&self, obj: &mut [u8]) {
        if let Some(destroy) = &self.destroy {
            destroy(obj);
        }
    }
}

impl fmt::Debug for ObjectHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHooks")
            .field("init", &self.init.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}
