//! Server-side state for one WebSocket client.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chat_core::{ConnectionId, ConnectionState, Frame, Session, SessionError, Side};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

/// A client connection as the server sees it.
pub struct ClientConnection {
    /// Identity assigned at accept time.
    pub id: ConnectionId,
    /// Lifecycle state.
    session: Mutex<Session>,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was accepted.
    pub connected_at: Instant,
    /// When the last pong (or any inbound frame) was received.
    last_pong: Mutex<Instant>,
    /// Count of frames dropped due to a full or closed channel.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a connection in the `Connecting` state.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            session: Mutex::new(Session::new(Side::Server)),
            tx,
            connected_at: now,
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.session.lock().state()
    }

    /// Whether commands from and broadcasts to this client are live.
    pub fn is_connected(&self) -> bool {
        self.session.lock().is_connected()
    }

    /// Handshake finished.
    pub fn mark_connected(&self) -> Result<(), SessionError> {
        self.session.lock().mark_connected(self.id.clone()).map(|_| ())
    }

    /// Teardown started; the client is still registered.
    pub fn begin_disconnecting(&self) -> Result<(), SessionError> {
        self.session.lock().begin_disconnecting()
    }

    /// Teardown finished.
    pub fn mark_disconnected(&self) -> Result<(), SessionError> {
        self.session.lock().mark_disconnected()
    }

    /// Queue a text frame for the client.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Encode a frame and queue it.
    pub fn send_frame(&self, frame: &Frame) -> bool {
        match frame.to_json() {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                warn!(client_id = %self.id, error = %e, "failed to encode frame");
                false
            }
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record inbound activity.
    pub fn mark_alive(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    /// Time since the last inbound activity.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
