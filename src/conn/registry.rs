//! Connection registry
//!
//! Mutex-guarded map from socket identifier to connection; the single source
//! of truth for "is this socket still live". The lock is held only for map
//! lookups and mutations, never across a socket operation or a business
//! callback. Acquiring clones the `Arc` under the lock, so a holder is
//! guaranteed the object cannot be reclaimed until it releases.

use crate::conn::connection::Conn;
use crate::net::socket::SocketId;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Lock-guarded socket-id -> connection map
#[derive(Default)]
pub struct ConnRegistry {
    inner: Mutex<HashMap<SocketId, Conn>>,
}

impl ConnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created connection
    ///
    /// Returns false when the id is already present. That can only happen if
    /// a closed descriptor was recycled before the old entry was removed,
    /// which the removal-before-close ordering rules out; callers treat it
    /// as a defect signal and drop the new connection.
    pub fn register(&self, conn: Conn) -> bool {
        use std::collections::hash_map::Entry;
        match self.inner.lock().entry(conn.id()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(conn);
                true
            }
        }
    }

    /// Look up a live connection and take a use-count credit
    ///
    /// `None` means the socket was already torn down by a concurrent path; a
    /// normal race outcome, not an error.
    pub fn acquire(&self, id: SocketId) -> Option<Conn> {
        self.inner.lock().get(&id).cloned()
    }

    /// Remove the entry; the single authoritative "no longer reachable" event
    pub fn remove(&self, id: SocketId) -> Option<Conn> {
        self.inner.lock().remove(&id)
    }

    /// Copy every connection matching `pred` out under one lock, taking a
    /// use-count credit for each
    pub fn snapshot_filtered<F>(&self, mut pred: F) -> Vec<Conn>
    where
        F: FnMut(&Conn) -> bool,
    {
        self.inner
            .lock()
            .values()
            .filter(|c| pred(c))
            .cloned()
            .collect()
    }

    /// Remove every client-role connection whose heartbeat expired at `now`
    ///
    /// Peers are never expired. Collect-then-erase under a single lock hold;
    /// the caller closes the removed sockets afterwards, which preserves the
    /// removal-happens-before-close ordering.
    pub fn remove_expired_clients(&self, now: u64, interval_secs: i64) -> Vec<Conn> {
        let mut map = self.inner.lock();
        let expired: Vec<SocketId> = map
            .values()
            .filter(|c| !c.is_peer() && c.heartbeat_expired(now, interval_secs))
            .map(|c| c.id())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| map.remove(&id))
            .collect()
    }

    /// Remove and return everything; engine teardown
    pub fn drain(&self) -> Vec<Conn> {
        self.inner.lock().drain().map(|(_, c)| c).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
