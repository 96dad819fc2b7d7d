//! Engine: lifecycle, configuration, and the business-facing send API
//!
//! Composes the registry, slot allocator, thread pools, control thread, and
//! the listen/peer tables around the boundary traits. The dispatch protocol
//! lives in [`dispatch`], the heartbeat/reconnect tick in [`control`], the
//! listen/peer bookkeeping in [`tables`].

pub mod control;
pub mod dispatch;
pub mod tables;

use crate::conn::ConnRegistry;
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::pool::SlotPool;
use crate::infrastructure::thread_pool::WorkerPool;
use crate::net::{EventMonitor, Handler, Protocol};
use crate::net::socket::SocketId;
use crate::{EngineError, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use tables::{ListenTable, PeerTable};

/// Shared engine state; everything the worker/control/I-O threads touch
pub(crate) struct EngineCore {
    /// Self-reference for scheduling tasks that call back into the core
    me: Weak<EngineCore>,
    pub(crate) monitor: Arc<dyn EventMonitor>,
    pub(crate) protocol: Arc<dyn Protocol>,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) registry: ConnRegistry,
    pub(crate) work_pool: WorkerPool,
    io_pool: WorkerPool,
    /// True while the engine is stopped; checked cooperatively by the
    /// message-worker loop, the control loop, and the I/O loops
    pub(crate) stop: AtomicBool,
    config: Mutex<EngineConfig>,
    /// Connection slot allocator; exists only while running
    pub(crate) slots: Mutex<Option<SlotPool>>,
    pub(crate) listen_table: ListenTable,
    pub(crate) peer_table: PeerTable,
    init_error: Mutex<String>,
    control: Mutex<Option<JoinHandle<()>>>,
}

/// Multi-threaded connection-lifecycle engine
///
/// Owns every live connection. I/O threads poll the event monitor, work
/// threads run business callbacks, one control thread drives heartbeat
/// expiry and outbound reconnection.
pub struct Engine {
    core: Arc<EngineCore>,
}

impl Engine {
    /// Create a stopped engine with default configuration
    pub fn new(
        monitor: Arc<dyn EventMonitor>,
        protocol: Arc<dyn Protocol>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        Self::with_config(monitor, protocol, handler, EngineConfig::default())
    }

    /// Create a stopped engine with an explicit configuration
    pub fn with_config(
        monitor: Arc<dyn EventMonitor>,
        protocol: Arc<dyn Protocol>,
        handler: Arc<dyn Handler>,
        config: EngineConfig,
    ) -> Self {
        Self {
            core: Arc::new_cyclic(|me| EngineCore {
                me: me.clone(),
                monitor,
                protocol,
                handler,
                registry: ConnRegistry::new(),
                work_pool: WorkerPool::new("netcore-work"),
                io_pool: WorkerPool::new("netcore-io"),
                stop: AtomicBool::new(true),
                config: Mutex::new(config),
                slots: Mutex::new(None),
                listen_table: ListenTable::new(),
                peer_table: PeerTable::new(),
                init_error: Mutex::new(String::new()),
                control: Mutex::new(None),
            }),
        }
    }

    // Configuration setters; effective at the next start().

    /// Heartbeat interval in seconds; <= 0 disables expiry
    pub fn set_heartbeat_secs(&self, secs: i64) {
        self.core.config.lock().heartbeat_secs = secs;
    }

    /// Reconnect interval in seconds; <= 0 disables reconnection
    pub fn set_reconnect_secs(&self, secs: i64) {
        self.core.config.lock().reconnect_secs = secs;
    }

    /// Number of I/O threads polling the event monitor
    pub fn set_io_threads(&self, count: usize) {
        self.core.config.lock().io_threads = count;
    }

    /// Number of work threads running business callbacks
    pub fn set_work_threads(&self, count: usize) {
        self.core.config.lock().work_threads = count;
    }

    /// Expected average live-connection count (sizes the slot allocator)
    pub fn set_average_connections(&self, count: usize) {
        self.core.config.lock().average_connections = count;
    }

    /// Start the engine
    ///
    /// Idempotent against a running engine (returns Ok). Not reentrant-safe
    /// for concurrent `start` calls. On failure the engine is left fully
    /// stopped and [`init_error`](Self::init_error) carries the reason.
    pub fn start(&self) -> Result<()> {
        let core = &self.core;
        if !core.stop.swap(false, Ordering::SeqCst) {
            // Already running.
            return Ok(());
        }
        core.init_error.lock().clear();
        let cfg = core.config.lock().clone();

        *core.slots.lock() = Some(SlotPool::with_capacity(cfg.pool_capacity()));

        if let Err(e) = core.monitor.start(cfg.event_capacity) {
            let msg = e.to_string();
            *core.init_error.lock() = msg.clone();
            self.stop();
            return Err(EngineError::Monitor(msg));
        }

        core.work_pool.start(cfg.work_threads);
        core.io_pool.start(cfg.io_threads);
        for _ in 0..cfg.io_threads {
            let core = Arc::clone(core);
            self.core.io_pool.execute(move || core.monitor_loop());
        }

        if let Err(msg) = core.listen_all() {
            core.init_error.lock().push_str(&msg);
            self.stop();
            return Err(EngineError::Listen(msg));
        }

        core.connect_all();

        let control_core = Arc::clone(core);
        let handle = std::thread::Builder::new()
            .name("netcore-control".to_string())
            .spawn(move || control_core.control_loop(cfg))?;
        *core.control.lock() = Some(handle);

        tracing::info!("engine started");
        Ok(())
    }

    /// Stop the engine
    ///
    /// Safe to call multiple times and from the destructor path. Stops the
    /// monitor, joins the control thread, drains both pools, then closes
    /// every remaining socket.
    pub fn stop(&self) {
        let core = &self.core;
        if core.stop.swap(true, Ordering::SeqCst) {
            // Already stopped.
            return;
        }
        core.monitor.stop();
        if let Some(handle) = core.control.lock().take() {
            let _ = handle.join();
        }
        core.io_pool.stop();
        core.work_pool.stop();

        // Pools are drained: no dispatch can race these teardown closes.
        for conn in core.registry.drain() {
            conn.socket().close();
            conn.mark_disconnected();
        }
        core.listen_table.close_all();
        core.peer_table.unmark_all();
        *core.slots.lock() = None;
        tracing::info!("engine stopped");
    }

    /// Block until the control thread has exited
    pub fn wait_stop(&self) {
        if let Some(handle) = self.core.control.lock().take() {
            let _ = handle.join();
        }
    }

    /// Bind a listen port (idempotent, keyed by port)
    ///
    /// Re-requesting a bound port is a no-op success. While stopped the port
    /// is only recorded; the next `start` binds it.
    pub fn listen(&self, port: u16) -> bool {
        self.core.listen(port)
    }

    /// Track and dial an outbound peer (idempotent, keyed by address+port)
    ///
    /// Connecting to an already-connected peer is a no-op success. While
    /// stopped the peer is only recorded; the next `start` dials it.
    pub fn connect(&self, ip: &str, port: u16) -> bool {
        self.core.connect(ip, port)
    }

    /// Broadcast to every connection in any of `recv_groups` and none of
    /// `filter_groups` (exclusion wins)
    pub fn broadcast_msg(&self, recv_groups: &[i64], filter_groups: &[i64], msg: Bytes) {
        let targets = self.core.registry.snapshot_filtered(|c| {
            c.in_any_group(recv_groups) && !c.in_any_group(filter_groups)
        });
        // Sends happen outside the registry lock; each target holds its own
        // use-count credit so teardown cannot reclaim it mid-send.
        for conn in targets {
            conn.send(&msg);
        }
    }

    /// Send to a single connection by identifier
    ///
    /// A missing or already-disconnected connection is skipped silently.
    /// Whether the peer closes first is an external protocol contract; this
    /// layer does not enforce it.
    pub fn send_msg(&self, id: SocketId, msg: &[u8]) {
        if let Some(conn) = self.core.registry.acquire(id) {
            conn.send(msg);
        }
    }

    /// Startup error message from the last failed `start`
    pub fn init_error(&self) -> String {
        self.core.init_error.lock().clone()
    }

    /// Number of live registered connections
    pub fn connection_count(&self) -> usize {
        self.core.registry.len()
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> &Arc<EngineCore> {
        &self.core
    }
}

impl EngineCore {
    /// Strong self-handle for task capture
    ///
    /// Infallible while any `&self` exists: a reference into the core can
    /// only be derived from a live `Arc`.
    pub(crate) fn arc(&self) -> Arc<EngineCore> {
        self.me.upgrade().expect("engine core self-reference")
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}
