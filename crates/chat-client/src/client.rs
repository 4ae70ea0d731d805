//! `ChatClient` and its connection driver.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chat_core::{
    ChatMessage, Command, ConnectionId, ConnectionState, DisconnectReason, Frame, Session, Side,
};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::ClientEvent;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A chat participant.
///
/// Dropping the client stops its background task.
pub struct ChatClient {
    nick: String,
    session: Arc<Mutex<Session>>,
    cmd_tx: mpsc::UnboundedSender<Frame>,
    cancel: CancellationToken,
    driver: Mutex<Option<JoinHandle<()>>>,
    dropped_events: Arc<AtomicU64>,
}

impl ChatClient {
    /// Start connecting to `config.url`.
    ///
    /// Returns at once; progress is reported on the event receiver. Events
    /// that find the receiver full are dropped and counted, never waited on.
    pub fn connect(config: ClientConfig) -> (Self, mpsc::Receiver<ClientEvent>) {
        let session = Arc::new(Mutex::new(Session::new(Side::Client)));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));
        let cancel = CancellationToken::new();
        let dropped_events = Arc::new(AtomicU64::new(0));
        let nick = config.nick.clone();

        let driver = Driver {
            config,
            session: Arc::clone(&session),
            cmd_rx,
            events: event_tx,
            dropped_events: Arc::clone(&dropped_events),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(driver.run());

        let client = Self {
            nick,
            session,
            cmd_tx,
            cancel,
            driver: Mutex::new(Some(handle)),
            dropped_events,
        };
        (client, event_rx)
    }

    /// Nick this client shouts as.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.session.lock().state()
    }

    /// Identity of the current connection instance.
    pub fn id(&self) -> Option<ConnectionId> {
        self.session.lock().id().cloned()
    }

    /// Events dropped because the receiver was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Submit a command. Only accepted while `Connected`.
    pub fn send(&self, command: Command) -> Result<(), ClientError> {
        let state = self.state();
        if !state.accepts_commands() {
            warn!(%state, command = command.name(), "rejecting command while not connected");
            return Err(ClientError::NotConnected { state });
        }
        self.cmd_tx
            .send(Frame::from(command))
            .map_err(|_| ClientError::Closed)
    }

    /// `shout-to-all` a chat line under this client's nick.
    pub fn shout(&self, text: impl Into<String>) -> Result<(), ClientError> {
        let command = Command::shout_to_all(&ChatMessage::new(self.nick.as_str(), text))?;
        self.send(command)
    }

    /// Stop reconnecting, close the socket and wait for the driver to exit.
    pub async fn close(&self) {
        self.cancel.cancel();
        let handle = self.driver.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// How one established connection ended.
enum Ended {
    /// Closed on purpose; do not reconnect.
    Closed,
    /// Lost; reconnect.
    Lost(DisconnectReason),
}

/// Background task owning the socket.
struct Driver {
    config: ClientConfig,
    session: Arc<Mutex<Session>>,
    cmd_rx: mpsc::UnboundedReceiver<Frame>,
    events: mpsc::Sender<ClientEvent>,
    dropped_events: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl Driver {
    #[instrument(skip_all, fields(nick = %self.config.nick, url = %self.config.url))]
    async fn run(mut self) {
        let policy = self.config.reconnect;
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 {
                if !policy.allows(attempt) {
                    warn!(attempts = attempt - 1, "giving up on reconnecting");
                    self.emit(ClientEvent::Error(format!(
                        "gave up after {} reconnect attempts",
                        attempt - 1
                    )));
                    break;
                }
                let delay = policy.delay_for(attempt);
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                info!(attempt, delay_ms, "reconnecting");
                self.emit(ClientEvent::ReconnectAttempt(attempt));
                tokio::select! {
                    () = self.cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }

            let connected = tokio::select! {
                () = self.cancel.cancelled() => break,
                res = connect_async(self.config.url.as_str()) => res,
            };
            let ws = match connected {
                Ok((ws, _)) => ws,
                Err(e) => {
                    warn!(error = %e, "connect failed");
                    self.emit(ClientEvent::Error(e.to_string()));
                    attempt = attempt.saturating_add(1);
                    continue;
                }
            };

            match self.run_connection(ws).await {
                Ended::Closed => break,
                Ended::Lost(reason) => {
                    let was_connected = {
                        let mut session = self.session.lock();
                        let was = session.is_connected();
                        if was {
                            let _ = session.begin_reconnect();
                        }
                        was
                    };
                    self.drain_unsent();
                    info!(%reason, "connection lost");
                    self.emit(ClientEvent::Disconnected { reason });
                    // A handshake resets the outage; a failed one keeps counting.
                    attempt = if was_connected { 1 } else { attempt.saturating_add(1) };
                }
            }
        }

        let _ = self.session.lock().mark_disconnected();
        if self.cancel.is_cancelled() {
            self.emit(ClientEvent::Disconnected {
                reason: DisconnectReason::LocalClose,
            });
        }
        debug!("client driver stopped");
    }

    async fn run_connection(&mut self, ws: WsStream) -> Ended {
        let (mut ws_tx, mut ws_rx) = ws.split();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return Ended::Closed;
                }
                cmd = self.cmd_rx.recv() => {
                    let Some(frame) = cmd else {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        return Ended::Closed;
                    };
                    if let Err(reason) = send_frame(&mut ws_tx, &frame).await {
                        return Ended::Lost(reason);
                    }
                }
                incoming = ws_rx.next() => {
                    let msg = match incoming {
                        None => return Ended::Lost(DisconnectReason::TransportClosed),
                        Some(Err(e)) => return Ended::Lost(DisconnectReason::TransportError(e.to_string())),
                        Some(Ok(msg)) => msg,
                    };
                    match msg {
                        Message::Text(text) => {
                            if let Some(greeting) = self.on_text(text.as_str()) {
                                if let Err(reason) = send_frame(&mut ws_tx, &greeting).await {
                                    return Ended::Lost(reason);
                                }
                            }
                        }
                        Message::Close(_) => return Ended::Lost(DisconnectReason::PeerClosed),
                        _ => {}
                    }
                }
            }
        }
    }

    /// Handle one server frame. Returns the greeting to send after a handshake.
    fn on_text(&mut self, text: &str) -> Option<Frame> {
        let frame = match Frame::from_json(text) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "ignoring malformed frame from server");
                self.emit(ClientEvent::Error(e.to_string()));
                return None;
            }
        };
        match frame {
            Frame::Connected { client_id } => {
                let handshake = self.session.lock().mark_connected(client_id.clone());
                match handshake {
                    Ok(previous) => {
                        info!(
                            prev_id = previous.as_ref().map(ConnectionId::as_str),
                            id = %client_id,
                            "connected"
                        );
                        self.emit(ClientEvent::Connected {
                            id: client_id,
                            previous,
                        });
                        match Command::shout_to_all(&ChatMessage::greeting(self.config.nick.as_str())) {
                            Ok(command) => Some(Frame::from(command)),
                            Err(e) => {
                                warn!(error = %e, "failed to build greeting");
                                None
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "unexpected handshake");
                        None
                    }
                }
            }
            Frame::Message { payload } => {
                debug!(%payload, "message received");
                self.emit(ClientEvent::Message(payload));
                None
            }
            Frame::Command { name, .. } => {
                warn!(command = %name, "ignoring command frame from server");
                None
            }
        }
    }

    /// Frames queued for a connection that is gone are not replayed.
    fn drain_unsent(&mut self) {
        let mut dropped = 0usize;
        while self.cmd_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "discarded unsent commands");
        }
    }

    /// Hand `event` to the receiver without waiting on it.
    fn emit(&self, event: ClientEvent) {
        match self.events.try_send(event) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                let dropped = self.dropped_events.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(?event, dropped, "event receiver full, dropping event");
            }
        }
    }
}

async fn send_frame(
    ws_tx: &mut futures::stream::SplitSink<WsStream, Message>,
    frame: &Frame,
) -> Result<(), DisconnectReason> {
    let json = match frame.to_json() {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to encode frame");
            return Ok(());
        }
    };
    ws_tx
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| DisconnectReason::TransportError(e.to_string()))
}
