//! Protocol framing extension points
//!
//! Concrete server flavors (length-prefixed TCP, line protocols, platform
//! accept loops) override these hooks. Every hook defaults to "not connected"
//! / unavailable, matching a bare engine with no transport attached.

use crate::conn::Conn;
use crate::net::socket::{ConnectState, Socket};
use std::sync::Arc;

/// Framing and platform-transport hooks
///
/// # Design Notes
/// - `recv_data` decides how many raw bytes constitute one message and spools
///   complete frames on the connection (`Conn::set_frames_pending`); the
///   engine only reacts to its returned state
/// - `listen_port`/`connect_peer` create platform sockets; `None` means the
///   bind/connect failed
/// - `monitor_connect` registers a connection for readiness events and is
///   called only after the business `on_connect` has returned
pub trait Protocol: Send + Sync {
    /// Consume raw bytes that arrived on a connection
    fn recv_data(&self, _conn: &Conn, _data: &[u8]) -> ConnectState {
        ConnectState::Disconnected
    }

    /// React to a completed send of `_sent` bytes
    fn send_data(&self, _conn: &Conn, _sent: usize) -> ConnectState {
        ConnectState::Disconnected
    }

    /// Bind a listening socket on `_port`
    fn listen_port(&self, _port: u16) -> Option<Arc<dyn Socket>> {
        None
    }

    /// Open an outbound connection to another server
    fn connect_peer(&self, _ip: &str, _port: u16) -> Option<Arc<dyn Socket>> {
        None
    }

    /// Begin monitoring a connection for I/O readiness
    fn monitor_connect(&self, _conn: &Conn) -> bool {
        false
    }
}

/// Bare protocol with every hook at its default
///
/// Useful as a placeholder while wiring an engine and in tests.
pub struct NullProtocol;

impl Protocol for NullProtocol {}
