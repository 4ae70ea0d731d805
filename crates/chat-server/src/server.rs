//! `ChatServer`: router, listener and shared state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use chat_core::ConnectionId;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::{Drained, ShutdownCoordinator};
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::session::run_ws_session;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live client registry.
    pub broadcast: Arc<BroadcastManager>,
    /// Shutdown signal for sessions.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server start time, for uptime.
    pub start_time: Instant,
    /// Limits and timers.
    pub config: Arc<ServerConfig>,
}

/// The broadcast chat server.
pub struct ChatServer {
    config: Arc<ServerConfig>,
    broadcast: Arc<BroadcastManager>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl ChatServer {
    /// Create a server with no live connections.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            broadcast: Arc::new(BroadcastManager::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the router: `/ws` and `/health`.
    pub fn router(&self) -> Router {
        let state = AppState {
            broadcast: Arc::clone(&self.broadcast),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            config: Arc::clone(&self.config),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind and serve in the background until [`stop`](Self::stop).
    ///
    /// Returns the bound address (useful with port `0`).
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "chat server listening");

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "server terminated");
            }
        });
        self.shutdown.attach_listener(handle);
        Ok(addr)
    }

    /// Stop accepting, disconnect every client and wait for their sessions.
    pub async fn stop(&self, timeout: Option<Duration>) -> Drained {
        self.shutdown.drain(timeout).await
    }

    /// Live client registry.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.broadcast
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.broadcast.connection_count().await;
    Json(health::health_check(state.start_time, connections))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response();
    }
    let live = state.broadcast.connection_count().await;
    if live >= state.config.max_connections {
        warn!(live, max = state.config.max_connections, "rejecting connection");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }
    ws.on_upgrade(move |socket| {
        let session = run_ws_session(
            socket,
            ConnectionId::new(),
            state.config,
            state.broadcast,
            state.shutdown.token(),
        );
        state.shutdown.track_session(session)
    })
}
