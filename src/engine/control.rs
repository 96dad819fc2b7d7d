//! Control thread: heartbeat expiry and scheduled reconnection
//!
//! One thread, fixed ~10 ms tick. Each tick scans for expired client
//! heartbeats and, when a reconnect interval is configured, periodically
//! re-dials every unconnected outbound peer.

use crate::conn::connection::now_unix;
use crate::engine::EngineCore;
use crate::infrastructure::config::EngineConfig;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// Tick period of the control loop
const TICK: Duration = Duration::from_millis(10);

impl EngineCore {
    /// Control thread body
    pub(crate) fn control_loop(&self, cfg: EngineConfig) {
        let mut last_connect = Instant::now();
        while !self.stop.load(Ordering::SeqCst) {
            self.heart_monitor(now_unix(), cfg.heartbeat_secs);
            if cfg.reconnect_secs > 0
                && last_connect.elapsed().as_secs() >= cfg.reconnect_secs as u64
            {
                last_connect = Instant::now();
                self.connect_all();
            }
            std::thread::sleep(TICK);
        }
    }

    /// Force-close every client connection whose heartbeat expired at `now`
    ///
    /// Disabled when the interval is <= 0. Peer-role connections are never
    /// expired. Expired entries leave the registry under one lock hold;
    /// their sockets are closed strictly afterwards, which keeps the
    /// removal-before-close ordering of every other disconnect path.
    pub(crate) fn heart_monitor(&self, now: u64, heartbeat_secs: i64) {
        if heartbeat_secs <= 0 {
            return;
        }
        let expired = self.registry.remove_expired_clients(now, heartbeat_secs);
        for conn in expired {
            tracing::info!("heartbeat expired, closing {}", conn.id());
            self.finish_close(conn);
        }
    }
}
