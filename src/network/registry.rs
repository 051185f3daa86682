// src/network/registry.rs

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashSet;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Notify};

use crate::events::model::{ConnectionRole, LogLevel};
use crate::history::HistoryStore;
use crate::network::events::emit_network_event;
use crate::network::peer::PeerIdentity;

/// Outbound half of a connection.
pub type PeerWriter = Box<dyn AsyncWrite + Unpin + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Peer identities that are connected or being connected to.
///
/// `try_reserve` is the only way to claim an identity and is an atomic
/// add-if-absent; a caller that gets `false` must not dial or register.
#[derive(Clone, Default)]
pub struct ReservationSet {
    inner: Arc<DashSet<PeerIdentity>>,
}

impl ReservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_reserve(&self, identity: &PeerIdentity) -> bool {
        self.inner.insert(identity.clone())
    }

    pub fn release(&self, identity: &PeerIdentity) -> bool {
        self.inner.remove(identity).is_some()
    }

    pub fn contains(&self, identity: &PeerIdentity) -> bool {
        self.inner.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Sorted copy of the current members.
    pub fn snapshot(&self) -> Vec<PeerIdentity> {
        let mut out: Vec<PeerIdentity> = self.inner.iter().map(|e| e.key().clone()).collect();
        out.sort();
        out
    }

    fn clear(&self) {
        self.inner.clear();
    }
}

/// A live link. Owned by the registry from registration until removal.
pub struct Connection {
    id: ConnectionId,
    identity: PeerIdentity,
    role: ConnectionRole,
    remote_addr: SocketAddr,
    connected_at: SystemTime,
    writer: PeerWriter,
    closed: Arc<Notify>,
}

impl Connection {
    async fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// Wake the reader and shut the write direction down.
    async fn close(mut self) {
        self.closed.notify_one();
        let _ = self.writer.shutdown().await;
    }

    fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            identity: self.identity.clone(),
            role: self.role,
            remote_addr: self.remote_addr,
            connected_at: self.connected_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub identity: PeerIdentity,
    pub role: ConnectionRole,
    pub remote_addr: SocketAddr,
    pub connected_at: SystemTime,
}

/// What a reader task needs to know about the connection it serves.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub identity: PeerIdentity,
    pub role: ConnectionRole,
    closed: Arc<Notify>,
}

impl ConnectionHandle {
    /// Resolves once the registry removed this connection.
    pub async fn closed(&self) {
        self.closed.notified().await
    }
}

/// Result of one broadcast pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: Vec<PeerIdentity>,
    pub pruned: Vec<PeerIdentity>,
    /// Set when the line could not be appended to the persistent log
    pub history_error: Option<String>,
}

struct RegistryState {
    connections: Vec<Connection>,
    history: HistoryStore,
}

/// Live connections, their writers and the message history behind one lock,
/// plus the lock-free reservation set.
///
/// Invariants:
/// * every registered connection's identity is reserved;
/// * removing a connection releases its reservation in the same critical section;
/// * at most one connection per identity (enforced by callers reserving first).
#[derive(Clone)]
pub struct ConnectionRegistry {
    reservations: ReservationSet,
    state: Arc<Mutex<RegistryState>>,
    next_id: Arc<AtomicU64>,
}

impl ConnectionRegistry {
    pub fn new(history: HistoryStore) -> Self {
        Self {
            reservations: ReservationSet::new(),
            state: Arc::new(Mutex::new(RegistryState {
                connections: Vec::new(),
                history,
            })),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn reservations(&self) -> &ReservationSet {
        &self.reservations
    }

    pub fn try_reserve(&self, identity: &PeerIdentity) -> bool {
        self.reservations.try_reserve(identity)
    }

    pub fn release(&self, identity: &PeerIdentity) -> bool {
        self.reservations.release(identity)
    }

    pub fn is_reserved(&self, identity: &PeerIdentity) -> bool {
        self.reservations.contains(identity)
    }

    /// Reserved identities ("connected or connecting"), sorted.
    pub fn reserved_peers(&self) -> Vec<PeerIdentity> {
        self.reservations.snapshot()
    }

    /// Add a connection whose identity the caller already reserved.
    pub async fn register(
        &self,
        identity: PeerIdentity,
        role: ConnectionRole,
        remote_addr: SocketAddr,
        writer: PeerWriter,
    ) -> ConnectionHandle {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let closed = Arc::new(Notify::new());
        let conn = Connection {
            id,
            identity: identity.clone(),
            role,
            remote_addr,
            connected_at: SystemTime::now(),
            writer,
            closed: closed.clone(),
        };
        self.state.lock().await.connections.push(conn);
        emit_network_event(
            "registry",
            LogLevel::Debug,
            "connection_registered",
            Some(identity.to_string()),
            Some(format!("id={} role={:?} remote={}", id, role, remote_addr)),
        );
        ConnectionHandle {
            id,
            identity,
            role,
            closed,
        }
    }

    /// Remove a connection, close it and release its reservation.
    /// Returns `None` when it was already removed (e.g. pruned by a broadcast).
    pub async fn remove(&self, id: ConnectionId) -> Option<PeerIdentity> {
        let conn = {
            let mut state = self.state.lock().await;
            let pos = state.connections.iter().position(|c| c.id == id)?;
            let conn = state.connections.remove(pos);
            self.reservations.release(&conn.identity);
            conn
        };
        let identity = conn.identity.clone();
        conn.close().await;
        Some(identity)
    }

    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let state = self.state.lock().await;
        state.connections.iter().map(Connection::info).collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    pub async fn count_for(&self, identity: &PeerIdentity) -> usize {
        let state = self.state.lock().await;
        state
            .connections
            .iter()
            .filter(|c| &c.identity == identity)
            .count()
    }

    /// Append a received line to the history.
    pub async fn record_line(&self, line: &str) -> io::Result<()> {
        self.state.lock().await.history.append(line).await
    }

    /// Append `line` to the history, then write it to every connection.
    ///
    /// Connections whose write fails are removed (writer shut down, reader woken,
    /// reservation released) during the same pass; the others still receive the line.
    pub async fn fan_out(&self, line: &str) -> FanOutReport {
        let mut report = FanOutReport::default();
        let mut state = self.state.lock().await;
        if let Err(e) = state.history.append(line).await {
            report.history_error = Some(e.to_string());
        }
        let mut i = 0;
        while i < state.connections.len() {
            match state.connections[i].send_line(line).await {
                Ok(()) => {
                    report.delivered.push(state.connections[i].identity.clone());
                    i += 1;
                }
                Err(e) => {
                    let conn = state.connections.remove(i);
                    self.reservations.release(&conn.identity);
                    emit_network_event(
                        "registry",
                        LogLevel::Warn,
                        "peer_write_failed",
                        Some(conn.identity.to_string()),
                        Some(format!("id={} error={}", conn.id, e)),
                    );
                    report.pruned.push(conn.identity.clone());
                    conn.close().await;
                }
            }
        }
        report
    }

    pub async fn history(&self) -> Vec<String> {
        self.state.lock().await.history.lines().to_vec()
    }

    pub async fn history_len(&self) -> usize {
        self.state.lock().await.history.len()
    }

    /// Empty the in-memory history and delete the log file.
    pub async fn clear_history(&self) -> io::Result<()> {
        self.state.lock().await.history.clear().await
    }

    pub async fn flush_history(&self) -> io::Result<()> {
        self.state.lock().await.history.flush().await
    }

    /// Close and remove every connection and drop every reservation,
    /// including in-flight dials. Used by shutdown only.
    pub async fn drain(&self) -> Vec<PeerIdentity> {
        let drained: Vec<Connection> = {
            let mut state = self.state.lock().await;
            let drained = std::mem::take(&mut state.connections);
            self.reservations.clear();
            drained
        };
        let mut identities = Vec::with_capacity(drained.len());
        for conn in drained {
            identities.push(conn.identity.clone());
            conn.close().await;
        }
        identities
    }
}
