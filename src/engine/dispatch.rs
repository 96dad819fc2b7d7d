//! Event dispatch and the per-connection counter protocol
//!
//! No lock is held on the receive hot path. All cross-thread coordination on
//! one connection's lifecycle runs through the shared `Arc` (use count) plus
//! two atomic counters on the connection:
//!
//! - `read_count` serializes message delivery. Every arrival increments it;
//!   only the increment that observes 0 schedules a worker. The worker resets
//!   it to 1 per iteration and exits only when its decrement observes 1,
//!   which proves no arrival was folded in behind its back. An arrival folded
//!   into a running worker forces at least one more `on_msg` call, so nothing
//!   is dropped and two workers never run for one connection.
//! - `close_work` makes the close notification fire exactly once. Every path
//!   that detects the disconnect (explicit close, heartbeat expiry, receive
//!   failure, worker observing `connected == false`) increments it; only the
//!   increment that observes 0 schedules the close callback.
//!
//! The close callback is ordered strictly after the last `on_msg`: a closer
//! racing a live worker bumps `read_count` instead of notifying, which forces
//! the worker through one more loop; the worker then sees `connected ==
//! false` on exit and performs the notification itself.
//!
//! Registry removal is ordered strictly before the socket close on every
//! path, so a recycled descriptor can never collide with a stale entry.

use crate::conn::{Conn, Connection, Role};
use crate::engine::EngineCore;
use crate::net::monitor::NetEvent;
use crate::net::socket::{ConnectState, Socket, SocketId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

impl EngineCore {
    /// I/O thread body: block on the monitor and forward events
    pub(crate) fn monitor_loop(&self) {
        while !self.stop.load(Ordering::SeqCst) {
            let Some(event) = self.monitor.wait() else {
                break;
            };
            match event {
                NetEvent::Accepted(sock) => {
                    self.on_accepted(sock, Role::Client);
                }
                NetEvent::Readable { id, data } => {
                    self.on_readable(id, &data);
                }
                NetEvent::SendDone { id, len } => {
                    self.on_send_done(id, len);
                }
                NetEvent::Closed(id) => {
                    self.close_by_id(id);
                }
            }
        }
    }

    /// Register a freshly accepted or connected socket
    ///
    /// Returns false when the slot pool is exhausted or the id collides; the
    /// new socket is closed and the attempt dropped without touching live
    /// connections.
    pub(crate) fn on_accepted(&self, socket: Arc<dyn Socket>, role: Role) -> bool {
        let Some(slot) = self.slots.lock().as_ref().and_then(|p| p.acquire()) else {
            tracing::warn!("slot pool exhausted, dropping {}", socket.id());
            socket.close();
            return false;
        };
        let conn = Connection::new(socket, role, slot);
        conn.refresh_heartbeat();
        if !self.registry.register(conn.clone()) {
            tracing::warn!("duplicate id {}, dropping connection", conn.id());
            conn.socket().close();
            return false;
        }
        // `conn` is the task's use-count credit; the registry holds its own.
        let core = self.arc();
        self.work_pool.execute(move || core.connect_worker(conn));
        true
    }

    /// Work task: business connect notification, then begin monitoring
    ///
    /// Monitoring must not start before `on_connect` has returned, or the
    /// business layer could see `on_msg` for a connection it has not
    /// finished initializing.
    pub(crate) fn connect_worker(&self, conn: Conn) {
        self.handler.on_connect(&conn);
        if !self.protocol.monitor_connect(&conn) {
            self.close_by_id(conn.id());
        }
        // Dropping `conn` releases the task's credit.
    }

    /// Raw bytes arrived on a registered socket
    pub(crate) fn on_readable(&self, id: SocketId, data: &[u8]) -> ConnectState {
        let Some(conn) = self.registry.acquire(id) else {
            // Already torn down by a concurrent path.
            return ConnectState::Disconnected;
        };
        conn.refresh_heartbeat();

        let state = match catch_unwind(AssertUnwindSafe(|| {
            self.protocol.recv_data(&conn, data)
        })) {
            Ok(state) => state,
            Err(_) => {
                tracing::warn!("panic in recv_data for {} suppressed", id);
                return ConnectState::Connected;
            }
        };
        if state == ConnectState::Disconnected {
            drop(conn);
            self.close_by_id(id);
            return state;
        }

        // Admission: only the arrival that observes 0 starts a worker. A
        // nonzero pre-value means a worker is active (or about to be); the
        // bump forces it through at least one more on_msg before it may
        // exit, so this arrival is not lost.
        if conn.read_count.fetch_add(1, Ordering::SeqCst) > 0 {
            return state;
        }
        let core = self.arc();
        self.work_pool.execute(move || core.msg_worker(conn));
        state
    }

    /// Work task: serialized message delivery for one connection
    pub(crate) fn msg_worker(&self, conn: Conn) {
        while !self.stop.load(Ordering::SeqCst) {
            conn.read_count.store(1, Ordering::SeqCst);
            // Unit return: engine control flow never depends on what the
            // business callback does. A panicking callback costs this one
            // delivery; the loop and its counters stay intact.
            if catch_unwind(AssertUnwindSafe(|| self.handler.on_msg(&conn))).is_err() {
                tracing::warn!("panic in on_msg for {} suppressed", conn.id());
            }
            if !conn.is_connected() {
                break;
            }
            if conn.frames_pending() {
                continue;
            }
            if conn.read_count.fetch_sub(1, Ordering::SeqCst) == 1 {
                // No arrival folded in while we were checking.
                break;
            }
        }
        // Strictly after the last on_msg for this connection.
        if !conn.is_connected() {
            self.notify_on_close(&conn);
        }
        // Dropping `conn` releases the worker's credit, on every exit path.
    }

    /// A queued send completed at the platform layer
    pub(crate) fn on_send_done(&self, id: SocketId, sent: usize) -> ConnectState {
        let Some(conn) = self.registry.acquire(id) else {
            return ConnectState::Disconnected;
        };
        if !conn.is_connected() {
            return ConnectState::Disconnected;
        }
        match catch_unwind(AssertUnwindSafe(|| self.protocol.send_data(&conn, sent))) {
            Ok(state) => state,
            Err(_) => {
                tracing::warn!("panic in send_data for {} suppressed", id);
                ConnectState::Connected
            }
        }
    }

    /// Tear down a connection by id; lookup miss is a normal race outcome
    pub(crate) fn close_by_id(&self, id: SocketId) {
        let Some(conn) = self.registry.remove(id) else {
            return;
        };
        self.finish_close(conn);
    }

    /// Close a connection already removed from the registry
    ///
    /// Removal happened before this call; the socket close comes second, so
    /// the platform cannot hand the descriptor to a new client while a
    /// registry entry still points at it. The `read_count` bump either finds
    /// no worker (pre-value 0: notify here) or forces the live worker
    /// through one more loop, after which the worker notifies.
    pub(crate) fn finish_close(&self, conn: Conn) {
        conn.socket().close();
        conn.mark_disconnected();
        if conn.read_count.fetch_add(1, Ordering::SeqCst) == 0 {
            self.notify_on_close(&conn);
        }
        // Dropping `conn` releases the closer's credit.
    }

    /// Schedule the close callback exactly once
    pub(crate) fn notify_on_close(&self, conn: &Conn) {
        if conn.close_work.fetch_add(1, Ordering::SeqCst) == 0 {
            let core = self.arc();
            let conn = Conn::clone(conn);
            self.work_pool.execute(move || core.close_worker(conn));
        }
    }

    /// Work task: unmark the peer slot, then the business close notification
    pub(crate) fn close_worker(&self, conn: Conn) {
        self.peer_table.unmark(&conn);
        self.handler.on_close(&conn);
    }
}
