//! Readiness-event monitor boundary
//!
//! The monitor is the external backend that tells the engine "socket X is
//! readable/writable/closed". Its internal polling algorithm is out of scope;
//! the engine only starts it, stops it, and blocks in [`EventMonitor::wait`]
//! from each I/O thread.

use crate::net::socket::{Socket, SocketId};
use std::sync::Arc;

/// Readiness event delivered to an I/O thread
pub enum NetEvent {
    /// A new inbound connection was accepted (or an outbound connect completed
    /// at the platform layer)
    Accepted(Arc<dyn Socket>),
    /// Raw bytes arrived on a registered socket
    Readable { id: SocketId, data: Vec<u8> },
    /// A previously queued send completed; `len` bytes left the socket buffer
    SendDone { id: SocketId, len: usize },
    /// The platform layer detected a disconnect
    Closed(SocketId),
}

impl std::fmt::Debug for NetEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetEvent::Accepted(sock) => f.debug_tuple("Accepted").field(&sock.id()).finish(),
            NetEvent::Readable { id, data } => f
                .debug_struct("Readable")
                .field("id", id)
                .field("len", &data.len())
                .finish(),
            NetEvent::SendDone { id, len } => f
                .debug_struct("SendDone")
                .field("id", id)
                .field("len", len)
                .finish(),
            NetEvent::Closed(id) => f.debug_tuple("Closed").field(id).finish(),
        }
    }
}

/// Monitor startup failure with a retrievable message
///
/// The engine surfaces this string verbatim through `Engine::init_error`.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MonitorError(pub String);

/// Readiness-notification backend
pub trait EventMonitor: Send + Sync {
    /// Start the backend with a fixed event-capacity ceiling
    fn start(&self, capacity: usize) -> Result<(), MonitorError>;

    /// Stop the backend; every thread blocked in [`wait`](Self::wait) must
    /// return `None` promptly
    fn stop(&self);

    /// Block until the next readiness event; `None` once stopped
    fn wait(&self) -> Option<NetEvent>;
}
