//! Intrusive blocking queue.
//!
//! Nodes carry their own forward link (a [`Link`] field exposed through the
//! [`QueueNode`] trait), so enqueueing never allocates: the queue owns only
//! head/tail pointers and the lock/condvar pair. Ownership of a node
//! transfers to the queue at push and back to the caller at pop; a producer
//! must not touch a node after pushing it.
//!
//! Push/pop preserve FIFO order for a single producer/consumer pair.
//! [`Queue::push_chain_to_head`] deliberately breaks plain FIFO at batch
//! granularity: the spliced chain is served before everything already
//! queued, which is what a requeue-after-failure wants.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Intrusive forward link embedded in a queue node.
///
/// Initialize with [`Link::new`] and leave it alone afterwards; the queue
/// owns the link while the node is enqueued.
pub struct Link<T>(Option<NonNull<T>>);

impl<T> Link<T> {
    /// An unlinked link.
    #[must_use]
    pub const fn new() -> Self {
        Self(None)
    }

    fn set(&mut self, next: Option<NonNull<T>>) {
        self.0 = next;
    }

    fn take(&mut self) -> Option<NonNull<T>> {
        self.0.take()
    }
}

impl<T> Default for Link<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Link").field(&self.0.is_some()).finish()
    }
}

// SAFETY: a Link only ever points at another node of the same chain, and the
// chain is traversed exclusively by whoever owns it (the queue under its
// lock, or a detached chain by value). Sendness follows the node type.
unsafe impl<T: Send> Send for Link<T> {}
unsafe impl<T: Sync> Sync for Link<T> {}

/// A node that can be chained through an embedded forward link.
pub trait QueueNode: Sized {
    /// Accessor for the node's intrusive link.
    fn next_link(&mut self) -> &mut Link<Self>;
}

/// A detached chain of nodes: the head/tail pair used for bulk transfer.
///
/// Assemble a batch with [`push_back`](QueueChain::push_back), splice it
/// onto a queue with [`Queue::push_chain_to_head`], or drain one out of a
/// queue with [`Queue::pop_all`]/[`Queue::pop_to_chain`] and walk it with
/// [`pop_front`](QueueChain::pop_front). Nodes still chained when the
/// `QueueChain` drops are released.
pub struct QueueChain<T: QueueNode> {
    head: Option<NonNull<T>>,
    tail: Option<NonNull<T>>,
    marker: PhantomData<Box<T>>,
}

// SAFETY: the chain exclusively owns every node reachable from `head`; the
// raw pointers are never shared outside the owning chain.
unsafe impl<T: QueueNode + Send> Send for QueueChain<T> {}

impl<T: QueueNode> Default for QueueChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: QueueNode> QueueChain<T> {
    /// An empty chain.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            marker: PhantomData,
        }
    }

    /// True when the chain holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Appends a node at the tail.
    pub fn push_back(&mut self, node: Box<T>) {
        let mut node = NonNull::from(Box::leak(node));
        // SAFETY: the node was just leaked; this chain is its sole owner.
        unsafe { node.as_mut().next_link().set(None) };
        match self.tail {
            Some(mut tail) => {
                // SAFETY: tail is the chain's last node and nothing else
                // aliases it while we hold &mut self.
                unsafe { tail.as_mut().next_link().set(Some(node)) };
            }
            None => self.head = Some(node),
        }
        self.tail = Some(node);
    }

    /// Detaches and returns the head node.
    pub fn pop_front(&mut self) -> Option<Box<T>> {
        let head = self.head?;
        // SAFETY: head was leaked into this chain by push_back; ownership
        // transfers back to the box here and the pointer is not used again.
        let mut node = unsafe { Box::from_raw(head.as_ptr()) };
        self.head = node.next_link().take();
        if self.head.is_none() {
            self.tail = None;
        }
        Some(node)
    }

    /// Detaches the entire chain, leaving this one empty.
    #[must_use]
    pub fn take_all(&mut self) -> QueueChain<T> {
        std::mem::take(self)
    }

    /// Splices `chain` in front of this chain's current contents.
    fn splice_front(&mut self, mut chain: QueueChain<T>) {
        let Some(mut chain_tail) = chain.tail else {
            return;
        };
        match self.head {
            Some(old_head) => {
                // SAFETY: chain_tail is the last node of `chain`, owned by
                // value here; linking it to our old head keeps every node
                // singly owned.
                unsafe { chain_tail.as_mut().next_link().set(Some(old_head)) };
            }
            None => self.tail = chain.tail,
        }
        self.head = chain.head;
        chain.head = None;
        chain.tail = None;
    }
}

impl<T: QueueNode> Drop for QueueChain<T> {
    fn drop(&mut self) {
        while self.pop_front().is_some() {}
    }
}

impl<T: QueueNode> fmt::Debug for QueueChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueChain")
            .field("is_empty", &self.is_empty())
            .finish_non_exhaustive()
    }
}

/// Thread-safe intrusive queue with blocking pop and bulk transfer.
pub struct Queue<T: QueueNode> {
    chain: Mutex<QueueChain<T>>,
    not_empty: Condvar,
}

impl<T: QueueNode> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: QueueNode> Queue<T> {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chain: Mutex::new(QueueChain::new()),
            not_empty: Condvar::new(),
        }
    }

    /// Appends a node and wakes one waiter if the queue was empty.
    pub fn push(&self, node: Box<T>) {
        if self.push_ex(node) {
            self.not_empty.notify_one();
        }
    }

    /// Appends a node without signaling.
    ///
    /// Returns true exactly when the queue went from empty to non-empty;
    /// the caller decides when (and whether) to wake a waiter, which lets a
    /// batch of pushes signal once.
    pub fn push_ex(&self, node: Box<T>) -> bool {
        let mut chain = self.chain.lock();
        let was_empty = chain.is_empty();
        chain.push_back(node);
        was_empty
    }

    /// Splices a whole chain in front of the queue and wakes one waiter if
    /// the queue was empty.
    ///
    /// The chain's nodes are served before everything already queued,
    /// preserving the chain's own order: LIFO at batch granularity, FIFO
    /// within the batch.
    pub fn push_chain_to_head(&self, chain: QueueChain<T>) {
        if self.push_chain_to_head_ex(chain) {
            self.not_empty.notify_one();
        }
    }

    /// Splices a whole chain in front of the queue without signaling.
    ///
    /// Returns true exactly when a non-empty chain made the queue go from
    /// empty to non-empty.
    pub fn push_chain_to_head_ex(&self, chain: QueueChain<T>) -> bool {
        if chain.is_empty() {
            return false;
        }
        let mut guard = self.chain.lock();
        let was_empty = guard.is_empty();
        guard.splice_front(chain);
        was_empty
    }

    /// Pops the head node, waiting if the queue is empty.
    ///
    /// The wait is a single pass: once woken (by a push or a termination
    /// signal) the queue is re-checked and `None` is returned if it is still
    /// empty. Consumers treat that as the cue to check their shutdown flag.
    pub fn pop(&self) -> Option<Box<T>> {
        self.pop_inner(true)
    }

    /// Pops the head node, returning `None` immediately if the queue is
    /// empty.
    pub fn try_pop(&self) -> Option<Box<T>> {
        self.pop_inner(false)
    }

    fn pop_inner(&self, blocked: bool) -> Option<Box<T>> {
        let mut chain = self.chain.lock();
        if chain.is_empty() && blocked {
            self.not_empty.wait(&mut chain);
        }
        chain.pop_front()
    }

    /// Detaches the entire chain, waiting if the queue is empty.
    ///
    /// Same single-pass wait as [`pop`](Queue::pop); the returned chain is
    /// empty if a termination signal won the race. Detaching is O(1)
    /// regardless of queue length, so a consumer can drain under the lock
    /// and process outside it.
    pub fn pop_all(&self) -> QueueChain<T> {
        self.pop_all_inner(true)
    }

    /// Detaches the entire chain, returning an empty chain immediately if
    /// the queue is empty.
    pub fn try_pop_all(&self) -> QueueChain<T> {
        self.pop_all_inner(false)
    }

    fn pop_all_inner(&self, blocked: bool) -> QueueChain<T> {
        let mut chain = self.chain.lock();
        if chain.is_empty() && blocked {
            self.not_empty.wait(&mut chain);
        }
        chain.take_all()
    }

    /// Drains the current contents into a detached chain without waiting.
    pub fn pop_to_chain(&self) -> QueueChain<T> {
        self.chain.lock().take_all()
    }

    /// Wakes one waiting consumer without enqueuing anything.
    ///
    /// The woken consumer observes an empty pop result; shutdown state lives
    /// with the caller, not in the queue.
    pub fn terminate(&self) {
        self.not_empty.notify_one();
    }

    /// Wakes up to `count` waiting consumers without enqueuing anything.
    pub fn terminate_all(&self, count: usize) {
        for _ in 0..count {
            self.not_empty.notify_one();
        }
    }
}

impl<T: QueueNode> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("is_empty", &self.chain.lock().is_empty())
            .finish_non_exhaustive()
    }
}
