//! WebSocket session lifecycle: one accepted client from upgrade through disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use chat_core::{ConnectionId, DisconnectReason, Frame};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;
use super::handler::handle_text;
use crate::config::ServerConfig;

/// Run a WebSocket session for an accepted client.
///
/// 1. Sends the `connected` frame carrying `client_id`, then enters `Connected`
/// 2. Dispatches inbound text frames as commands
/// 3. Forwards queued broadcasts and sends periodic pings
/// 4. On close, passes through `Disconnecting` (still registered) to `Disconnected`
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    client_id: ConnectionId,
    config: Arc<ServerConfig>,
    broadcast: Arc<BroadcastManager>,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.outbound_queue_size.max(1));
    let connection = Arc::new(ClientConnection::new(client_id.clone(), send_tx));

    let hello = match (Frame::Connected {
        client_id: client_id.clone(),
    })
    .to_json()
    {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "failed to encode connected frame");
            let _ = connection.mark_disconnected();
            return;
        }
    };
    if ws_tx.send(Message::Text(hello.into())).await.is_err() {
        info!("client went away during handshake");
        let _ = connection.mark_disconnected();
        return;
    }
    if let Err(e) = connection.mark_connected() {
        warn!(error = %e, "handshake rejected");
        return;
    }
    broadcast.add(Arc::clone(&connection)).await;
    info!("client connected");

    let ping_every = config.ping_interval();
    let pong_timeout = config.pong_timeout();
    let outbound_conn = Arc::clone(&connection);
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(ping_every);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else {
                        return DisconnectReason::LocalClose;
                    };
                    if let Err(e) = ws_tx.send(Message::Text(text.as_str().to_owned().into())).await {
                        return DisconnectReason::TransportError(e.to_string());
                    }
                }
                _ = ping_interval.tick() => {
                    if outbound_conn.last_pong_elapsed() > pong_timeout {
                        warn!("client unresponsive for {pong_timeout:?}, disconnecting");
                        return DisconnectReason::PingTimeout;
                    }
                    if let Err(e) = ws_tx.send(Message::Ping(Vec::new().into())).await {
                        return DisconnectReason::TransportError(e.to_string());
                    }
                }
            }
        }
    });

    let reason = loop {
        tokio::select! {
            () = shutdown.cancelled() => break DisconnectReason::ServerShutdown,
            finished = &mut outbound => {
                break finished.unwrap_or(DisconnectReason::TransportClosed);
            }
            incoming = ws_rx.next() => {
                let msg = match incoming {
                    None => break DisconnectReason::TransportClosed,
                    Some(Err(e)) => break DisconnectReason::TransportError(e.to_string()),
                    Some(Ok(msg)) => msg,
                };
                connection.mark_alive();
                match msg {
                    Message::Text(text) => {
                        let _ = handle_text(text.as_str(), &connection, &broadcast).await;
                    }
                    Message::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => {
                            let _ = handle_text(text, &connection, &broadcast).await;
                        }
                        Err(_) => debug!(len = data.len(), "ignoring non-UTF8 binary frame"),
                    },
                    Message::Close(_) => break DisconnectReason::PeerClosed,
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
        }
    };

    if let Err(e) = connection.begin_disconnecting() {
        debug!(error = %e, "session already leaving");
    }
    info!(%reason, "client disconnecting");
    broadcast.remove(&client_id).await;
    outbound.abort();
    if let Err(e) = connection.mark_disconnected() {
        warn!(error = %e, "failed to finalize session");
    }
    info!(
        %reason,
        dropped = connection.drop_count(),
        age_ms = u64::try_from(connection.age().as_millis()).unwrap_or(u64::MAX),
        "client disconnected"
    );
}
