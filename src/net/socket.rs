//! Platform socket boundary
//!
//! The engine never creates, reads, or polls sockets itself; it holds an
//! `Arc<dyn Socket>` per connection and only ever sends on it or closes it.
//! Platform backends (epoll/IOCP/in-memory test doubles) implement this trait.

use std::io;
use std::net::SocketAddr;

/// Stable socket identifier
///
/// Unique among live connections; the registry key. The OS may recycle the
/// underlying descriptor, which is exactly why registry removal must happen
/// before the socket is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(pub u64);

impl std::fmt::Display for SocketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sock#{}", self.0)
    }
}

/// Connection state reported by the framing layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectState {
    /// Connection is healthy
    Connected,
    /// Peer is gone; the engine runs the close path
    Disconnected,
}

/// Minimal socket surface consumed by the engine
///
/// # Design Notes
/// - `send` is best-effort; short writes are the framing layer's problem
/// - `close` must be idempotent: the engine may race several close paths
/// - implementations must be thread-safe; sends can run concurrently with
///   a close from the heartbeat scan
pub trait Socket: Send + Sync {
    /// Stable identifier used as the registry key
    fn id(&self) -> SocketId;

    /// Write bytes to the peer
    fn send(&self, data: &[u8]) -> io::Result<usize>;

    /// Close the underlying socket (idempotent)
    fn close(&self);

    /// Peer address, if known
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}
