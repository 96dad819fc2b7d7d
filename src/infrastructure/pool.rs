//! Connection slot allocator
//!
//! Fixed-size reservation pool sized for the expected average live-connection
//! count. A connection holds one [`SlotToken`] for its whole lifetime; the
//! token returns to the pool only when the connection object is dropped, so a
//! slot can never be reissued while any acquired reference to the connection
//! is outstanding.
//!
//! Uses crossbeam-queue for lock-free acquire/release.

use crossbeam_queue::ArrayQueue;
use std::sync::Arc;

/// Fixed-capacity slot pool
///
/// # Example
/// ```
/// use netcore::infrastructure::pool::SlotPool;
///
/// let pool = SlotPool::with_capacity(2);
/// let a = pool.acquire().unwrap();
/// let b = pool.acquire().unwrap();
/// assert!(pool.acquire().is_none()); // exhausted
/// drop(a);
/// assert!(pool.acquire().is_some()); // slot came back
/// # drop(b);
/// ```
pub struct SlotPool {
    free: Arc<ArrayQueue<usize>>,
}

impl SlotPool {
    /// Create a pool with `capacity` slots, all free
    pub fn with_capacity(capacity: usize) -> Self {
        let free = ArrayQueue::new(capacity.max(1));
        for index in 0..capacity {
            // Cannot fail: we push exactly `capacity` items into a queue of
            // that capacity.
            let _ = free.push(index);
        }
        Self {
            free: Arc::new(free),
        }
    }

    /// Reserve a slot
    ///
    /// Returns `None` when the pool is exhausted; the accept path treats that
    /// as "drop this connection attempt" without touching live connections.
    ///
    /// This is O(1) and lock-free.
    #[inline]
    pub fn acquire(&self) -> Option<SlotToken> {
        self.free.pop().map(|index| SlotToken {
            index,
            free: Arc::clone(&self.free),
        })
    }

    /// Number of free slots
    #[inline]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Total slot capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.free.capacity()
    }
}

/// RAII slot reservation; returns to the pool on drop
pub struct SlotToken {
    index: usize,
    free: Arc<ArrayQueue<usize>>,
}

impl SlotToken {
    /// Slot index, stable for the lifetime of the reservation
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for SlotToken {
    fn drop(&mut self) {
        // Cannot fail: every index in flight came out of this queue.
        let _ = self.free.push(self.index);
    }
}

impl std::fmt::Debug for SlotToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotToken").field("index", &self.index).finish()
    }
}
