//! Connection-lifecycle and concurrency core for multi-threaded network servers
//!
//! The engine owns every live connection, dispatches readiness events from an
//! external [`net::EventMonitor`] onto I/O threads, runs business callbacks on a
//! work thread pool, and drives heartbeat expiry plus outbound reconnection from
//! a control thread.
//!
//! # Architecture
//! - **conn**: Connection object + lock-guarded registry
//! - **engine**: lifecycle, event dispatch protocol, control tick, listen/peer tables
//! - **net**: boundary traits (socket, event monitor, protocol framing, business handler)
//! - **infrastructure**: cold path (config, logging, slot allocator, thread pool)
//!
//! The per-connection dispatch protocol is lock-free: a shared `Arc<Connection>`
//! carries the use count, while two explicit atomic counters serialize message
//! delivery and make the close notification fire exactly once. See
//! [`engine::dispatch`] for the protocol.

pub mod conn;
pub mod engine;
pub mod infrastructure;
pub mod net;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use conn::{Conn, Connection, Role};
pub use engine::Engine;
pub use infrastructure::config::EngineConfig;
pub use net::{ConnectState, EventMonitor, Handler, NetEvent, Protocol, Socket, SocketId};

use thiserror::Error;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("event monitor failed to start: {0}")]
    Monitor(String),

    #[error("{0}")]
    Listen(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;
