//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Default cap on concurrent chunk generations per session.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Default minimum interval between emitted frames.
pub const DEFAULT_MIN_EMIT_INTERVAL: Duration = Duration::from_millis(200);

/// Default per-chunk token limit.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Model requested when the client does not name one.
    pub default_model: String,

    /// Hard cap on per-session concurrency; client requests are clamped to
    /// this, never rejected.
    pub max_concurrency: usize,

    /// Minimum interval between emitted frames.
    pub min_emit_interval: Duration,

    /// Per-chunk token limit for generation requests.
    pub max_tokens: u32,

    /// CORS allowed origins (empty = allow any, development mode).
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".parse().unwrap(),
            default_model: "echo".to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            min_emit_interval: DEFAULT_MIN_EMIT_INTERVAL,
            max_tokens: DEFAULT_MAX_TOKENS,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the fallback model name.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the concurrency cap.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Set the minimum interval between emitted frames.
    pub fn with_min_emit_interval(mut self, interval: Duration) -> Self {
        self.min_emit_interval = interval;
        self
    }

    /// Set the CORS allowed origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// The session knobs this config implies.
    pub fn session_config(&self) -> taliesin_engine::SessionConfig {
        taliesin_engine::SessionConfig::default().with_min_emit_interval(self.min_emit_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_concurrency_floor() {
        let config = ServerConfig::default().with_max_concurrency(0);
        assert_eq!(config.max_concurrency, 1);
    }
}
