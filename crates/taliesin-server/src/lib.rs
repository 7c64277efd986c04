//! HTTP/SSE transport for the taliesin writing engine.
//!
//! Routes:
//! - `GET  /health` - liveness probe
//! - `POST /api/v1/write` - start a write session, streamed as SSE frames
//! - `POST /api/v1/align` - clean and reconcile an alignment map
//! - `POST /api/v1/streams/stop` - cancel a running write session

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use routes::{AlignRequest, AlignResponse, StopRequest, StopResponse, WriteRequest};
pub use state::AppState;

use axum::http::HeaderValue;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use taliesin_llm::SharedBackend;

/// The taliesin HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given backend and configuration.
    pub fn new(backend: SharedBackend, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(backend, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::health_routes())
            .nest("/api/v1", self.api_routes())
            .layer(self.cors_layer())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::post;

        Router::new()
            .route("/write", post(routes::write_handler))
            .route("/align", post(routes::align_handler))
            .route("/streams/stop", post(routes::stop_stream_handler))
    }

    fn cors_layer(&self) -> CorsLayer {
        let origins = &self.state.config.cors_origins;
        if origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let parsed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin, "Ignoring unparseable CORS origin");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parsed))
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }

    /// Run the server until the process is stopped.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        let router = self.router();

        info!(backend = self.state.backend.name(), %addr, "Starting server");

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind {addr}: {e}")))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {e}")))
    }
}
