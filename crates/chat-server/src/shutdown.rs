//! Server shutdown: one cancellation signal, and the tasks it must outlive.
//!
//! The coordinator owns the accept loop handle and tracks every WebSocket
//! session, so [`ShutdownCoordinator::drain`] returns only once clients have
//! been told to leave and their sessions have left the registry.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// How long [`ShutdownCoordinator::drain`] waits when no timeout is given.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of [`ShutdownCoordinator::drain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Drained {
    /// Accept loop and every session finished.
    Clean,
    /// The timeout passed first.
    TimedOut {
        /// Sessions still running when the wait gave up.
        sessions_left: usize,
    },
}

/// Stops the accept loop and every live session.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownCoordinator {
    /// Coordinator with nothing attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token sessions and the accept loop watch.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wrap a session future so `drain` waits for it.
    pub fn track_session<F: Future>(&self, session: F) -> TrackedFuture<F> {
        self.sessions.track_future(session)
    }

    /// Sessions started and not yet finished.
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Hand over an accept loop task.
    pub fn attach_listener(&self, handle: JoinHandle<()>) {
        self.listeners.lock().push(handle);
    }

    /// Signal shutdown without waiting.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            info!(sessions = self.sessions.len(), "shutdown requested");
        }
        self.token.cancel();
        let _ = self.sessions.close();
    }

    /// Signal shutdown, then wait up to `timeout` (default 10s) for the accept
    /// loops and every tracked session to finish.
    pub async fn drain(&self, timeout: Option<Duration>) -> Drained {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.trigger();

        let listeners = std::mem::take(&mut *self.listeners.lock());
        let wait_all = async {
            let _ = futures::future::join_all(listeners).await;
            self.sessions.wait().await;
        };

        if tokio::time::timeout(timeout, wait_all).await.is_ok() {
            info!("shutdown complete");
            Drained::Clean
        } else {
            let sessions_left = self.sessions.len();
            warn!(sessions_left, ?timeout, "shutdown timed out");
            Drained::TimedOut { sessions_left }
        }
    }
}
