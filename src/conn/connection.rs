//! Per-connection shared state
//!
//! A connection is shared by the registry and by every in-flight operation
//! that acquired it: the `Arc` strong count is the use count, so the object
//! (and its pool slot, via the held [`SlotToken`]) is reclaimed exactly when
//! the last holder releases. The `read_count` and `close_work` counters stay
//! explicit atomics because the dispatch protocol depends on their precise
//! increment-then-check semantics, not merely on shared ownership.

use crate::infrastructure::pool::SlotToken;
use crate::net::socket::{Socket, SocketId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Shared connection handle; the strong count is the use count
pub type Conn = Arc<Connection>;

/// How the connection came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Inbound accepted client; subject to heartbeat expiry
    Client,
    /// Outbound link this engine initiated toward another server; exempt
    /// from heartbeat enforcement and re-dialed by the reconnect tick
    Peer,
}

/// Per-connection mutable state plus the dispatch-protocol counters
pub struct Connection {
    socket: Arc<dyn Socket>,
    role: Role,
    /// Group-membership tags used for broadcast targeting
    groups: Mutex<Vec<i64>>,
    /// True from registration until the registry removes the connection
    connected: AtomicBool,
    /// Unix seconds of the last successful receive
    last_heartbeat: AtomicU64,
    /// Re-entrancy token: at most one message worker per connection, and a
    /// missed-wakeup counter so arrivals during a worker run are not lost
    pub(crate) read_count: AtomicI64,
    /// Guarantees the close callback fires exactly once
    pub(crate) close_work: AtomicI64,
    /// Set by the framing layer when a complete frame is already spooled
    frames_pending: AtomicBool,
    /// Pool reservation; returns to the allocator when the last holder drops
    _slot: SlotToken,
}

impl Connection {
    /// Wrap a freshly accepted or connected socket
    pub fn new(socket: Arc<dyn Socket>, role: Role, slot: SlotToken) -> Conn {
        Arc::new(Self {
            socket,
            role,
            groups: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            last_heartbeat: AtomicU64::new(now_unix()),
            read_count: AtomicI64::new(0),
            close_work: AtomicI64::new(0),
            frames_pending: AtomicBool::new(false),
            _slot: slot,
        })
    }

    /// Registry key
    #[inline]
    pub fn id(&self) -> SocketId {
        self.socket.id()
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn is_peer(&self) -> bool {
        self.role == Role::Peer
    }

    /// Underlying socket handle
    #[inline]
    pub fn socket(&self) -> &Arc<dyn Socket> {
        &self.socket
    }

    /// Send bytes to the peer
    ///
    /// Silently skipped once the connection has been removed from the
    /// registry: the peer going away concurrently with a send is an expected
    /// race, not a fault.
    pub fn send(&self, data: &[u8]) {
        if !self.is_connected() {
            return;
        }
        if let Err(e) = self.socket.send(data) {
            tracing::debug!("send on {} failed: {}", self.id(), e);
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Flip `connected` off; called after registry removal, before the close
    /// notification step
    #[inline]
    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Stamp the heartbeat with the current wall clock
    #[inline]
    pub fn refresh_heartbeat(&self) {
        self.refresh_heartbeat_at(now_unix());
    }

    /// Stamp the heartbeat with an explicit clock (tests inject time here)
    #[inline]
    pub fn refresh_heartbeat_at(&self, now: u64) {
        self.last_heartbeat.store(now, Ordering::Relaxed);
    }

    /// Unix seconds of the last successful receive
    #[inline]
    pub fn last_heartbeat(&self) -> u64 {
        self.last_heartbeat.load(Ordering::Relaxed)
    }

    /// Whether the heartbeat has expired at `now` for the given interval
    ///
    /// A stamp in the future (clock skew) counts as fresh.
    pub fn heartbeat_expired(&self, now: u64, interval_secs: i64) -> bool {
        let last = self.last_heartbeat();
        if now < last {
            return false;
        }
        (now - last) as i64 >= interval_secs
    }

    /// Replace the broadcast group tags
    pub fn set_groups(&self, groups: Vec<i64>) {
        *self.groups.lock() = groups;
    }

    /// True when the connection belongs to at least one of `group_ids`
    pub fn in_any_group(&self, group_ids: &[i64]) -> bool {
        if group_ids.is_empty() {
            return false;
        }
        let groups = self.groups.lock();
        group_ids.iter().any(|id| groups.contains(id))
    }

    /// Framing layer: a complete frame is spooled and consumable
    #[inline]
    pub fn set_frames_pending(&self, pending: bool) {
        self.frames_pending.store(pending, Ordering::SeqCst);
    }

    /// Whether a complete frame is already available to consume
    #[inline]
    pub fn frames_pending(&self) -> bool {
        self.frames_pending.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("role", &self.role)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Wall clock in unix seconds
pub(crate) fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
