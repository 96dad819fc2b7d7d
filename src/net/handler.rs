//! Business callback target
//!
//! The isolation boundary between engine control flow and user code. `on_msg`
//! deliberately returns nothing: the dispatch protocol is driven entirely by
//! engine-observed state, never by what the business layer does.

use crate::conn::Conn;

/// Business-layer callbacks, invoked from work threads
///
/// # Ordering guarantees
/// - `on_msg` calls for one connection are totally ordered, never concurrent
/// - `on_close` fires exactly once per connection, strictly after the last
///   `on_msg` for it has returned
/// - readiness monitoring starts only after `on_connect` has returned
pub trait Handler: Send + Sync {
    /// A connection was registered (inbound accept or outbound connect)
    fn on_connect(&self, conn: &Conn);

    /// At least one message is available on the connection
    ///
    /// Fire-and-forget: reading too little data here is normal, the engine
    /// will call again when more arrives.
    fn on_msg(&self, conn: &Conn);

    /// The connection is gone; last callback for this connection
    fn on_close(&self, conn: &Conn);
}
