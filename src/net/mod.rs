//! Boundary traits for external collaborators
//!
//! The engine consumes a platform socket abstraction, a readiness-event
//! monitor, protocol framing hooks, and a business callback target. All four
//! are specified here at their interface boundary only; the engine never
//! reaches below these traits.

pub mod handler;
pub mod monitor;
pub mod protocol;
pub mod socket;

pub use handler::Handler;
pub use monitor::{EventMonitor, MonitorError, NetEvent};
pub use protocol::Protocol;
pub use socket::{ConnectState, Socket, SocketId};
