//! Connection object and registry
//!
//! `Connection` is the shared per-connection state plus the atomic counters
//! that implement the dispatch protocol; `ConnRegistry` is the single source
//! of truth for "is this socket still live".

pub mod connection;
pub mod registry;

pub use connection::{Conn, Connection, Role};
pub use registry::ConnRegistry;
