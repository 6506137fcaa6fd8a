use lib_common::core::{Dispatcher, MatchLookup};
use lib_common::ingestors::TennisPollingPlugin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;

/// Shared state handed to every HTTP and WebSocket handler.
#[derive(Clone)]
pub struct AppState {
    // Live set first, then snapshot cache
    pub lookup: MatchLookup,
    // Subscriber registry for WebSocket clients
    pub dispatcher: Arc<Dispatcher>,
    // Upgraded WebSocket sessions; axum does not wait for these on shutdown
    pub sessions: TaskTracker,
}

impl AppState {
    pub fn new(lookup: MatchLookup, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            lookup,
            dispatcher,
            sessions: TaskTracker::new(),
        }
    }

    pub fn from_plugin(plugin: &TennisPollingPlugin) -> Self {
        Self::new(plugin.lookup(), plugin.dispatcher())
    }

    /// Closes the dispatcher, then waits up to `timeout` for every WebSocket
    /// session to send its last frames and exit. Returns false on timeout.
    pub async fn close_sessions(&self, timeout: Duration) -> bool {
        self.dispatcher.close();
        self.sessions.close();

        let drained = tokio::time::timeout(timeout, self.sessions.wait()).await.is_ok();
        if drained {
            log::info!("All WebSocket sessions finished.");
        } else {
            log::warn!(
                "{} WebSocket sessions still open after {:?}, shutting down anyway.",
                self.sessions.len(),
                timeout
            );
        }
        drained
    }
}
