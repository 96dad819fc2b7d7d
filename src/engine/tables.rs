//! Listen-port and outbound-peer tables
//!
//! Both tables are idempotently (re)established: an entry records intent, its
//! value records whether the intent is currently satisfied. Each table has its
//! own lock, held only for map lookups and mutations plus the bind/connect
//! call that fills an entry, never across a business callback.

use crate::conn::{Connection, Role};
use crate::engine::EngineCore;
use crate::net::socket::{Socket, SocketId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Configured listen ports; value is the bound socket once established
pub(crate) struct ListenTable {
    inner: Mutex<HashMap<u16, Option<Arc<dyn Socket>>>>,
}

impl ListenTable {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Close every bound socket; entries stay so the next start rebinds
    pub(crate) fn close_all(&self) {
        for sock in self.inner.lock().values_mut() {
            if let Some(sock) = sock.take() {
                sock.close();
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn bound_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self
            .inner
            .lock()
            .iter()
            .filter(|(_, v)| v.is_some())
            .map(|(p, _)| *p)
            .collect();
        ports.sort_unstable();
        ports
    }
}

/// Configured outbound peers keyed by packed IPv4+port; value is the socket
/// id of the live outbound connection once established
pub(crate) struct PeerTable {
    inner: Mutex<HashMap<u64, Option<SocketId>>>,
}

impl PeerTable {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Reset the slot owned by a closing outbound connection so the next
    /// reconnect tick retries it; no-op for client-role connections
    pub(crate) fn unmark(&self, conn: &Connection) {
        if conn.role() != Role::Peer {
            return;
        }
        let id = conn.id();
        for slot in self.inner.lock().values_mut() {
            if *slot == Some(id) {
                *slot = None;
                break;
            }
        }
    }

    /// Mark every slot unconnected; engine teardown
    pub(crate) fn unmark_all(&self) {
        for slot in self.inner.lock().values_mut() {
            *slot = None;
        }
    }

    #[cfg(test)]
    pub(crate) fn connected_count(&self) -> usize {
        self.inner.lock().values().filter(|v| v.is_some()).count()
    }
}

/// Pack an IPv4 address and port into one table key
pub(crate) fn pack_addr(ip: &str, port: u16) -> Option<u64> {
    let addr: Ipv4Addr = ip.parse().ok()?;
    Some((u64::from(u32::from(addr)) << 16) | u64::from(port))
}

/// Inverse of [`pack_addr`]
pub(crate) fn unpack_addr(key: u64) -> (String, u16) {
    let addr = Ipv4Addr::from((key >> 16) as u32);
    (addr.to_string(), (key & 0xFFFF) as u16)
}

impl EngineCore {
    /// Bind one listen port; see `Engine::listen`
    pub(crate) fn listen(&self, port: u16) -> bool {
        let mut table = self.listen_table.inner.lock();
        if matches!(table.get(&port), Some(Some(_))) {
            // Already bound; no second socket.
            return true;
        }
        table.insert(port, None);
        if self.stop.load(Ordering::SeqCst) {
            // Recorded only; the next start() binds it.
            return true;
        }
        match self.protocol.listen_port(port) {
            Some(sock) => {
                table.insert(port, Some(sock));
                true
            }
            None => false,
        }
    }

    /// Bind every recorded-but-unbound port; aggregates failures
    pub(crate) fn listen_all(&self) -> std::result::Result<(), String> {
        let mut table = self.listen_table.inner.lock();
        let pending: Vec<u16> = table
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(p, _)| *p)
            .collect();
        let mut failed: Vec<u16> = Vec::new();
        for port in pending {
            match self.protocol.listen_port(port) {
                Some(sock) => {
                    table.insert(port, Some(sock));
                }
                None => failed.push(port),
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            failed.sort_unstable();
            let ports: Vec<String> = failed.iter().map(|p| p.to_string()).collect();
            Err(format!("listen port: {} failed", ports.join(" ")))
        }
    }

    /// Track and dial one outbound peer; see `Engine::connect`
    pub(crate) fn connect(&self, ip: &str, port: u16) -> bool {
        let Some(key) = pack_addr(ip, port) else {
            return false;
        };
        let sock = {
            let mut table = self.peer_table.inner.lock();
            if matches!(table.get(&key), Some(Some(_))) {
                // Already connected.
                return true;
            }
            table.insert(key, None);
            if self.stop.load(Ordering::SeqCst) {
                // Recorded only; the next start() dials it.
                return true;
            }
            match self.protocol.connect_peer(ip, port) {
                Some(sock) => {
                    table.insert(key, Some(sock.id()));
                    sock
                }
                None => return false,
            }
        };
        // Registration runs outside the table lock: it takes the registry
        // lock and schedules the on_connect task.
        if !self.on_accepted(sock, Role::Peer) {
            self.peer_table.inner.lock().insert(key, None);
        }
        true
    }

    /// Re-dial every unconnected peer slot; best-effort
    pub(crate) fn connect_all(&self) {
        if self.stop.load(Ordering::SeqCst) {
            return;
        }
        let pending: Vec<u64> = self
            .peer_table
            .inner
            .lock()
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect();
        for key in pending {
            let (ip, port) = unpack_addr(key);
            let Some(sock) = self.protocol.connect_peer(&ip, port) else {
                tracing::debug!("reconnect to {}:{} failed", ip, port);
                continue;
            };
            self.peer_table.inner.lock().insert(key, Some(sock.id()));
            if !self.on_accepted(sock, Role::Peer) {
                self.peer_table.inner.lock().insert(key, None);
            }
        }
    }
}
