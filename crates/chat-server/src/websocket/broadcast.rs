//! Fan-out of broadcast frames to connected clients.

use std::collections::HashMap;
use std::sync::Arc;

use chat_core::{ConnectionId, Frame};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;

/// Registry of live clients and the broadcast operation over them.
pub struct BroadcastManager {
    /// Registered clients indexed by connection ID.
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl BroadcastManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Unregister a connection by ID.
    pub async fn remove(&self, connection_id: &ConnectionId) {
        let mut conns = self.connections.write().await;
        let _ = conns.remove(connection_id);
    }

    /// Look up a registered connection.
    pub async fn get(&self, connection_id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().await.get(connection_id).cloned()
    }

    /// Deliver `frame` to every connection currently in the `Connected` state.
    ///
    /// Returns how many clients the frame was queued for.
    pub async fn broadcast_all(&self, frame: &Frame) -> usize {
        let json = match frame.to_json() {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(error = %e, "failed to serialize broadcast frame");
                return 0;
            }
        };
        let conns = self.connections.read().await;
        let mut delivered = 0;
        for conn in conns.values() {
            if !conn.is_connected() {
                debug!(conn_id = %conn.id, state = %conn.state(), "skipping inactive client");
                continue;
            }
            if conn.send(Arc::clone(&json)) {
                delivered += 1;
            } else {
                warn!(conn_id = %conn.id, "failed to send broadcast to client");
            }
        }
        debug!(registered = conns.len(), delivered, "broadcast to all");
        delivered
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}
