use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use mythic_core::net::messages::ServerMessage;
use mythic_core::net::protocol::encode_server_message;
use mythic_core::player::PlayerId;

use crate::error::StoreError;
use crate::store::PlayerStore;

/// Process-unique id of one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A frame queued for the connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Ping,
    Close { code: u16, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundError {
    Encode(String),
    /// The client is not draining its queue.
    Full,
    Closed,
}

impl std::fmt::Display for OutboundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "encode failed: {e}"),
            Self::Full => write!(f, "outbound queue full"),
            Self::Closed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for OutboundError {}

impl<T> From<TrySendError<T>> for OutboundError {
    fn from(e: TrySendError<T>) -> Self {
        match e {
            TrySendError::Full(_) => Self::Full,
            TrySendError::Closed(_) => Self::Closed,
        }
    }
}

/// Sending side of a connection: the writer queue plus a kill switch that
/// tears down both the reader and the writer.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Outbound>,
    kill: CancellationToken,
}

impl SessionHandle {
    pub fn new(tx: mpsc::Sender<Outbound>, kill: CancellationToken) -> Self {
        Self { tx, kill }
    }

    pub fn send(&self, msg: &ServerMessage) -> Result<(), OutboundError> {
        let text = encode_server_message(msg).map_err(|e| OutboundError::Encode(e.to_string()))?;
        self.tx.try_send(Outbound::Text(text))?;
        Ok(())
    }

    pub fn send_ping(&self) -> Result<(), OutboundError> {
        self.tx.try_send(Outbound::Ping)?;
        Ok(())
    }

    /// Close with a close frame. Falls back to termination when the frame
    /// cannot be queued.
    pub fn close(&self, code: u16, reason: &str) {
        let frame = Outbound::Close {
            code,
            reason: reason.to_string(),
        };
        if self.tx.try_send(frame).is_err() {
            self.kill.cancel();
        }
    }

    /// Drop the connection without a close handshake.
    pub fn terminate(&self) {
        self.kill.cancel();
    }

    pub fn is_terminated(&self) -> bool {
        self.kill.is_cancelled()
    }
}

/// A bound (connection, player) pair.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub player_id: PlayerId,
    pub conn: ConnectionId,
    pub handle: SessionHandle,
    pub is_alive: bool,
    pub last_pong_at: Instant,
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<ConnectionId, Session>,
    by_player: HashMap<PlayerId, ConnectionId>,
}

/// Live sessions, at most one per player.
pub struct SessionRegistry {
    inner: Mutex<RegistryInner>,
    store: Arc<dyn PlayerStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn PlayerStore>) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            store,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `conn` to `player_id`. A previous session of the same player is
    /// terminated and its durable connection reference cleared before the
    /// new one is recorded.
    pub async fn bind(
        &self,
        conn: ConnectionId,
        player_id: PlayerId,
        handle: SessionHandle,
    ) -> Result<Session, StoreError> {
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            player_id: player_id.clone(),
            conn,
            handle,
            is_alive: true,
            last_pong_at: Instant::now(),
        };

        let evicted = {
            let mut inner = self.lock();
            let previous = inner.by_player.insert(player_id.clone(), conn);
            let evicted = previous
                .filter(|&old| old != conn)
                .and_then(|old| inner.sessions.remove(&old));
            inner.sessions.insert(conn, session.clone());
            evicted
        };

        if let Some(old) = evicted {
            tracing::info!(
                player_id = %player_id,
                old_conn = %old.conn,
                conn = %conn,
                "Evicting previous session"
            );
            old.handle.terminate();
            if let Err(e) = self.store.clear_connection(&old.session_id).await {
                tracing::warn!(
                    player_id = %player_id,
                    session_id = %old.session_id,
                    error = %e,
                    "Failed to clear evicted session reference"
                );
            }
        }

        self.store
            .bind_connection(&player_id, &session.session_id, chrono::Utc::now())
            .await?;

        tracing::info!(
            player_id = %player_id,
            conn = %conn,
            session_id = %session.session_id,
            "Session bound"
        );
        Ok(session)
    }

    /// Remove the session on `conn`. Idempotent: unbinding an unknown
    /// connection only logs.
    pub async fn unbind(&self, conn: ConnectionId, reason: &str) -> Option<Session> {
        let removed = {
            let mut inner = self.lock();
            let removed = inner.sessions.remove(&conn);
            if let Some(session) = &removed
                && inner.by_player.get(&session.player_id) == Some(&conn)
            {
                inner.by_player.remove(&session.player_id);
            }
            removed
        };

        let Some(session) = removed else {
            tracing::debug!(conn = %conn, reason, "Unbind for connection without a session");
            return None;
        };

        if let Err(e) = self.store.clear_connection(&session.session_id).await {
            tracing::warn!(
                player_id = %session.player_id,
                session_id = %session.session_id,
                error = %e,
                "Failed to clear session reference"
            );
        }

        tracing::info!(
            player_id = %session.player_id,
            conn = %conn,
            reason,
            "Session unbound"
        );
        Some(session)
    }

    pub fn lookup(&self, conn: ConnectionId) -> Option<Session> {
        self.lock().sessions.get(&conn).cloned()
    }

    pub fn all(&self) -> Vec<Session> {
        self.lock().sessions.values().cloned().collect()
    }

    /// Record a pong (transport or application level) on `conn`.
    pub fn mark_alive(&self, conn: ConnectionId) {
        self.mark_alive_at(conn, Instant::now());
    }

    pub fn mark_alive_at(&self, conn: ConnectionId, at: Instant) {
        if let Some(session) = self.lock().sessions.get_mut(&conn) {
            session.is_alive = true;
            session.last_pong_at = at;
        }
    }

    /// Flag `conn` as awaiting a pong.
    pub fn mark_pinged(&self, conn: ConnectionId) {
        if let Some(session) = self.lock().sessions.get_mut(&conn) {
            session.is_alive = false;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn alive_count(&self) -> usize {
        self.lock().sessions.values().filter(|s| s.is_alive).count()
    }

    /// Close every session with the given close frame and empty the
    /// registry. Returns the number of sessions closed.
    pub async fn close_all(&self, code: u16, reason: &str) -> usize {
        let drained: Vec<Session> = {
            let mut inner = self.lock();
            inner.by_player.clear();
            inner.sessions.drain().map(|(_, s)| s).collect()
        };
        for session in &drained {
            session.handle.close(code, reason);
            if let Err(e) = self.store.clear_connection(&session.session_id).await {
                tracing::warn!(
                    player_id = %session.player_id,
                    error = %e,
                    "Failed to clear session reference during shutdown"
                );
            }
        }
        drained.len()
    }
}
