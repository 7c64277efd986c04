//! POST /api/v1/write - SSE streaming write endpoint.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use taliesin_core::ChunkPair;
use taliesin_engine::{start_session, SessionRequest};

use crate::error::Result;
use crate::state::AppState;

/// Request body for the write endpoint.
#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    /// Rows of `[source, generated]` chunk pairs.
    pub chunks: Vec<[String; 2]>,

    /// Optional `[start, end)` row span to regenerate. Absent means all rows.
    #[serde(default)]
    pub span: Option<[usize; 2]>,

    /// Shared context for every generation request.
    #[serde(default)]
    pub context: String,

    /// Model override; falls back to the server's default.
    #[serde(default)]
    pub model: Option<String>,

    /// Requested concurrency; clamped to the server's cap.
    #[serde(default)]
    pub concurrency: Option<usize>,
}

/// First SSE event of a write stream: the handle for `/streams/stop`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamHandshake {
    /// Identifier for cancelling this stream.
    pub stream_id: Uuid,
}

/// Clamp a client's concurrency ask to the configured cap.
fn effective_concurrency(requested: Option<usize>, max: usize) -> usize {
    requested.unwrap_or(max).clamp(1, max)
}

/// Releases the registry entry when the SSE stream goes away, whether the
/// stream ran to completion or the client disconnected mid-generation.
struct StreamGuard {
    state: AppState,
    stream_id: Uuid,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.state.release_stream(self.stream_id);
    }
}

/// POST /api/v1/write - start a write session and stream its frames.
///
/// The first event (`stream`) carries the stream id; each following `frame`
/// event is one wire frame, ending with a `done: true` frame.
pub async fn write_handler(
    State(state): State<AppState>,
    Json(request): Json<WriteRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let rows: Vec<ChunkPair> = request
        .chunks
        .into_iter()
        .map(|[source, generated]| ChunkPair::with_generated(source, generated))
        .collect();

    let model = request
        .model
        .unwrap_or_else(|| state.config.default_model.clone());
    let concurrency = effective_concurrency(request.concurrency, state.config.max_concurrency);

    let mut session = SessionRequest::new(model, rows)
        .with_context(request.context)
        .with_concurrency(concurrency)
        .with_max_tokens(state.config.max_tokens);
    if let Some([start, end]) = request.span {
        session = session.with_span(start..end);
    }

    let (stream_id, token) = state.register_stream();
    // Dropping the guard covers every exit: setup errors below, normal
    // completion, and a dropped response body.
    let guard = StreamGuard {
        state: state.clone(),
        stream_id,
    };
    let frames = start_session(
        state.backend.clone(),
        session,
        state.config.session_config(),
        token,
    )
    .await?;

    let sse_stream = async_stream::stream! {
        let _guard = guard;
        yield Ok(Event::default()
            .event("stream")
            .json_data(StreamHandshake { stream_id })
            .unwrap_or_else(|_| Event::default()));

        let mut frames = std::pin::pin!(frames);
        while let Some(frame) = frames.next().await {
            yield Ok(Event::default()
                .event("frame")
                .json_data(&frame)
                .unwrap_or_else(|_| Event::default()));
        }
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        routing::post,
        Router,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use taliesin_llm::{MockBackend, MockScript};
    use tower::ServiceExt;

    use crate::config::ServerConfig;

    fn app(backend: MockBackend) -> Router {
        let config = ServerConfig::default().with_min_emit_interval(Duration::ZERO);
        let state = AppState::new(Arc::new(backend), config);
        Router::new()
            .route("/write", post(write_handler))
            .with_state(state)
    }

    fn write_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/write")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_streams_handshake_and_frames() {
        let backend = MockBackend::new(vec![MockScript::deltas(["Hello ", "world"])]);
        let response = app(backend)
            .oneshot(write_request(serde_json::json!({
                "chunks": [["source text", ""]],
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains("event: stream"));
        assert!(text.contains("stream_id"));
        assert!(text.contains("event: frame"));
        assert!(text.contains(r#""chunk_type":"init""#));
        assert!(text.contains(r#""done":true"#));
        // Replaying init + deltas yields the full text; the raw body carries
        // the pieces.
        assert!(text.contains("Hello"));
        assert!(text.contains("world"));
    }

    #[tokio::test]
    async fn test_client_disconnect_releases_registry_entry() {
        let config = ServerConfig::default().with_min_emit_interval(Duration::ZERO);
        let state = AppState::new(
            Arc::new(MockBackend::new(vec![MockScript::deltas(
                (0..50).map(|i| format!("piece{i} ")),
            )])),
            config,
        );
        let app = Router::new()
            .route("/write", post(write_handler))
            .with_state(state.clone());

        let response = app
            .oneshot(write_request(serde_json::json!({
                "chunks": [["source text", ""]],
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.active_streams(), 1);

        // Dropping the response without draining the body is a disconnect.
        drop(response);
        assert_eq!(state.active_streams(), 0);
    }

    #[tokio::test]
    async fn test_write_rejects_empty_chunks() {
        let response = app(MockBackend::with_text("x"))
            .oneshot(write_request(serde_json::json!({ "chunks": [] })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_write_unavailable_backend_is_503() {
        let response = app(MockBackend::unhealthy())
            .oneshot(write_request(serde_json::json!({
                "chunks": [["source", ""]],
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_write_oversized_concurrency_still_works() {
        let backend = MockBackend::new(vec![MockScript::text("a"), MockScript::text("b")]);
        let response = app(backend)
            .oneshot(write_request(serde_json::json!({
                "chunks": [["one", ""], ["two", ""]],
                "concurrency": 9999,
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(r#""done":true"#));
    }

    #[test]
    fn test_effective_concurrency_clamps() {
        assert_eq!(effective_concurrency(None, 5), 5);
        assert_eq!(effective_concurrency(Some(2), 5), 2);
        assert_eq!(effective_concurrency(Some(100), 5), 5);
        assert_eq!(effective_concurrency(Some(0), 5), 1);
    }
}
