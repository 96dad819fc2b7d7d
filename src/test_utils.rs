//! Test utilities: in-memory doubles for the boundary traits
//!
//! A scripted event monitor, a recording socket, a recording business
//! handler, and a scriptable protocol. Unit tests drive a fully started
//! engine through these without any platform I/O.

use crate::conn::Conn;
use crate::infrastructure::config::EngineConfig;
use crate::net::handler::Handler;
use crate::net::monitor::{EventMonitor, MonitorError, NetEvent};
use crate::net::protocol::Protocol;
use crate::net::socket::{ConnectState, Socket, SocketId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared ordered event log, linkable across doubles
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Small thread counts and pools for unit tests
pub fn subset_config() -> EngineConfig {
    EngineConfig {
        io_threads: 2,
        work_threads: 2,
        average_connections: 8,
        heartbeat_secs: 0,
        reconnect_secs: 0,
        event_capacity: 64,
    }
}

/// In-memory socket recording sends and closes
pub struct MemSocket {
    id: SocketId,
    sent: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
    close_count: AtomicUsize,
    close_hook: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl MemSocket {
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: SocketId(id),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            close_count: AtomicUsize::new(0),
            close_hook: Mutex::new(None),
        })
    }

    /// Run `hook` on every close; lets a test observe engine state at the
    /// exact moment the socket goes away
    pub fn with_close_hook(id: u64, hook: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        let sock = Self::new(id);
        *sock.close_hook.lock() = Some(Box::new(hook));
        sock
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

impl Socket for MemSocket {
    fn id(&self) -> SocketId {
        self.id
    }

    fn send(&self, data: &[u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        }
        self.sent.lock().push(data.to_vec());
        Ok(data.len())
    }

    fn close(&self) {
        if let Some(hook) = self.close_hook.lock().as_ref() {
            hook();
        }
        self.closed.store(true, Ordering::SeqCst);
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scripted event monitor: tests push events, I/O threads block on them
///
/// `stop()` drops the internal wake sender, which unblocks every waiter at
/// once with `None` (the contract real backends must honor).
pub struct ScriptedMonitor {
    tx: Sender<NetEvent>,
    rx: Receiver<NetEvent>,
    stop_pair: Mutex<(Option<Sender<()>>, Receiver<()>)>,
    started_capacity: Mutex<Option<usize>>,
    fail_with: Mutex<Option<String>>,
}

impl ScriptedMonitor {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        let (stop_tx, stop_rx) = unbounded();
        Self {
            tx,
            rx,
            stop_pair: Mutex::new((Some(stop_tx), stop_rx)),
            started_capacity: Mutex::new(None),
            fail_with: Mutex::new(None),
        }
    }

    /// Make the next `start` fail with `msg`
    pub fn fail_start(&self, msg: &str) {
        *self.fail_with.lock() = Some(msg.to_string());
    }

    /// Queue an event for the I/O threads
    pub fn push(&self, event: NetEvent) {
        self.tx.send(event).expect("monitor event queue");
    }

    /// Capacity the engine passed to `start`, if started
    pub fn started_capacity(&self) -> Option<usize> {
        *self.started_capacity.lock()
    }
}

impl Default for ScriptedMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl EventMonitor for ScriptedMonitor {
    fn start(&self, capacity: usize) -> Result<(), MonitorError> {
        if let Some(msg) = self.fail_with.lock().clone() {
            return Err(MonitorError(msg));
        }
        *self.started_capacity.lock() = Some(capacity);
        let (stop_tx, stop_rx) = unbounded();
        *self.stop_pair.lock() = (Some(stop_tx), stop_rx);
        Ok(())
    }

    fn stop(&self) {
        self.stop_pair.lock().0.take();
    }

    fn wait(&self) -> Option<NetEvent> {
        let stop_rx = self.stop_pair.lock().1.clone();
        crossbeam_channel::select! {
            recv(self.rx) -> event => event.ok(),
            recv(stop_rx) -> _ => None,
        }
    }
}

/// Recording business handler with per-connection concurrency tracking
pub struct RecordingHandler {
    log: EventLog,
    connects: AtomicUsize,
    msgs: AtomicUsize,
    closes: AtomicUsize,
    active_msgs: Mutex<HashMap<SocketId, usize>>,
    max_concurrent: AtomicUsize,
    msg_delay: Mutex<Duration>,
    frame_budget: Mutex<Option<usize>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::with_log(Arc::new(Mutex::new(Vec::new())))
    }

    /// Share an event log with another double for cross-object ordering
    pub fn with_log(log: EventLog) -> Self {
        Self {
            log,
            connects: AtomicUsize::new(0),
            msgs: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            active_msgs: Mutex::new(HashMap::new()),
            max_concurrent: AtomicUsize::new(0),
            msg_delay: Mutex::new(Duration::ZERO),
            frame_budget: Mutex::new(None),
        }
    }

    /// Act as the framing layer: each `on_msg` consumes one spooled frame
    /// and keeps `frames_pending` set while any remain
    pub fn set_frame_budget(&self, frames: usize) {
        *self.frame_budget.lock() = Some(frames);
    }

    /// Stretch every on_msg to widen overlap windows
    pub fn set_msg_delay(&self, delay: Duration) {
        *self.msg_delay.lock() = delay;
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn msg_count(&self) -> usize {
        self.msgs.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Largest number of on_msg calls ever active at once for one connection
    pub fn max_concurrent_msgs(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    pub fn shared_log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for RecordingHandler {
    fn on_connect(&self, conn: &Conn) {
        self.log.lock().push(format!("on_connect {}", conn.id()));
        self.connects.fetch_add(1, Ordering::SeqCst);
    }

    fn on_msg(&self, conn: &Conn) {
        {
            let mut active = self.active_msgs.lock();
            let entry = active.entry(conn.id()).or_insert(0);
            *entry += 1;
            self.max_concurrent.fetch_max(*entry, Ordering::SeqCst);
        }
        let delay = *self.msg_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.log.lock().push(format!("on_msg {}", conn.id()));
        self.msgs.fetch_add(1, Ordering::SeqCst);
        if let Some(remaining) = self.frame_budget.lock().as_mut() {
            *remaining = remaining.saturating_sub(1);
            conn.set_frames_pending(*remaining > 0);
        }
        if let Some(entry) = self.active_msgs.lock().get_mut(&conn.id()) {
            *entry -= 1;
        }
    }

    fn on_close(&self, conn: &Conn) {
        self.log.lock().push(format!("on_close {}", conn.id()));
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scriptable protocol: reachable peers, deniable listen ports, settable
/// receive state
pub struct TestProtocol {
    log: EventLog,
    recv_state: Mutex<ConnectState>,
    recv_panics: AtomicBool,
    spool_frames: AtomicBool,
    monitor_ok: AtomicBool,
    reachable: Mutex<HashSet<(String, u16)>>,
    deny_listen: Mutex<HashSet<u16>>,
    connect_attempts: AtomicUsize,
    listen_binds: AtomicUsize,
    send_data_calls: AtomicUsize,
    next_socket_id: AtomicU64,
}

impl TestProtocol {
    pub fn new() -> Self {
        Self::with_log(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn with_log(log: EventLog) -> Self {
        Self {
            log,
            recv_state: Mutex::new(ConnectState::Connected),
            recv_panics: AtomicBool::new(false),
            spool_frames: AtomicBool::new(false),
            monitor_ok: AtomicBool::new(true),
            reachable: Mutex::new(HashSet::new()),
            deny_listen: Mutex::new(HashSet::new()),
            connect_attempts: AtomicUsize::new(0),
            listen_binds: AtomicUsize::new(0),
            send_data_calls: AtomicUsize::new(0),
            // Outbound socket ids live far from test accept ids.
            next_socket_id: AtomicU64::new(1000),
        }
    }

    pub fn set_recv_state(&self, state: ConnectState) {
        *self.recv_state.lock() = state;
    }

    pub fn set_recv_panics(&self, panics: bool) {
        self.recv_panics.store(panics, Ordering::SeqCst);
    }

    /// Mark complete frames as spooled on every receive
    pub fn set_spool_frames(&self, spool: bool) {
        self.spool_frames.store(spool, Ordering::SeqCst);
    }

    pub fn set_monitor_ok(&self, ok: bool) {
        self.monitor_ok.store(ok, Ordering::SeqCst);
    }

    /// Mark an outbound peer address reachable
    pub fn allow_connect(&self, ip: &str, port: u16) {
        self.reachable.lock().insert((ip.to_string(), port));
    }

    /// Make binds on `port` fail
    pub fn deny_listen(&self, port: u16) {
        self.deny_listen.lock().insert(port);
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn listen_binds(&self) -> usize {
        self.listen_binds.load(Ordering::SeqCst)
    }

    pub fn send_data_count(&self) -> usize {
        self.send_data_calls.load(Ordering::SeqCst)
    }

    pub fn shared_log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn fresh_socket(&self) -> Arc<MemSocket> {
        MemSocket::new(self.next_socket_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for TestProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for TestProtocol {
    fn recv_data(&self, conn: &Conn, _data: &[u8]) -> ConnectState {
        if self.recv_panics.load(Ordering::SeqCst) {
            panic!("scripted recv_data panic");
        }
        if self.spool_frames.load(Ordering::SeqCst) {
            conn.set_frames_pending(true);
        }
        self.log.lock().push(format!("recv_data {}", conn.id()));
        *self.recv_state.lock()
    }

    fn send_data(&self, conn: &Conn, _sent: usize) -> ConnectState {
        self.send_data_calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(format!("send_data {}", conn.id()));
        ConnectState::Connected
    }

    fn listen_port(&self, port: u16) -> Option<Arc<dyn Socket>> {
        self.listen_binds.fetch_add(1, Ordering::SeqCst);
        if self.deny_listen.lock().contains(&port) {
            return None;
        }
        Some(self.fresh_socket())
    }

    fn connect_peer(&self, ip: &str, port: u16) -> Option<Arc<dyn Socket>> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.reachable.lock().contains(&(ip.to_string(), port)) {
            return None;
        }
        Some(self.fresh_socket())
    }

    fn monitor_connect(&self, conn: &Conn) -> bool {
        self.log.lock().push(format!("monitor_connect {}", conn.id()));
        self.monitor_ok.load(Ordering::SeqCst)
    }
}
