//! Application state shared across handlers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use taliesin_llm::SharedBackend;

use crate::config::ServerConfig;

/// Live write sessions, keyed by stream id.
pub type StreamRegistry = Arc<RwLock<HashMap<Uuid, CancellationToken>>>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The generation backend.
    pub backend: SharedBackend,

    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Cancellation tokens for in-flight write sessions.
    pub streams: StreamRegistry,
}

impl AppState {
    /// Create a new application state.
    pub fn new(backend: SharedBackend, config: ServerConfig) -> Self {
        Self {
            backend,
            config: Arc::new(config),
            streams: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a new write session, returning its id and token.
    pub fn register_stream(&self) -> (Uuid, CancellationToken) {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        self.streams.write().insert(id, token.clone());
        tracing::debug!(stream_id = %id, "Registered write session");
        (id, token)
    }

    /// Drop a session from the registry and cancel its token.
    ///
    /// Covers both normal completion and a client that went away mid-stream;
    /// cancelling an already finished session is a no-op.
    pub fn release_stream(&self, id: Uuid) {
        if let Some(token) = self.streams.write().remove(&id) {
            token.cancel();
            tracing::debug!(stream_id = %id, "Released write session");
        }
    }

    /// Cancel a session's token. Returns false if the id is unknown.
    pub fn cancel_stream(&self, id: Uuid) -> bool {
        let token = self.streams.write().remove(&id);
        match token {
            Some(token) => {
                token.cancel();
                tracing::info!(stream_id = %id, "Cancelled write session");
                true
            }
            None => false,
        }
    }

    /// Number of sessions currently registered.
    pub fn active_streams(&self) -> usize {
        self.streams.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taliesin_llm::MockBackend;

    fn state() -> AppState {
        AppState::new(Arc::new(MockBackend::with_text("x")), ServerConfig::default())
    }

    #[test]
    fn test_register_and_cancel() {
        let state = state();
        let (id, token) = state.register_stream();
        assert_eq!(state.active_streams(), 1);

        assert!(state.cancel_stream(id));
        assert!(token.is_cancelled());
        assert_eq!(state.active_streams(), 0);

        // Unknown id after removal.
        assert!(!state.cancel_stream(id));
    }

    #[test]
    fn test_release_is_idempotent_and_cancels() {
        let state = state();
        let (id, token) = state.register_stream();
        state.release_stream(id);
        state.release_stream(id);
        assert!(token.is_cancelled());
        assert_eq!(state.active_streams(), 0);
    }
}
