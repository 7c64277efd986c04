//! POST /api/v1/streams/stop - cancel a running write session.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Request body for the stop endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct StopRequest {
    /// Id from the write stream's handshake event.
    pub stream_id: Uuid,
}

/// Response body for the stop endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    /// Whether a session was found and cancelled.
    pub stopped: bool,
}

/// POST /api/v1/streams/stop - cancel a session's token.
///
/// The session's emission loop notices the token and closes the stream with
/// a terminal frame; in-flight backend calls are not force-killed.
pub async fn stop_stream_handler(
    State(state): State<AppState>,
    Json(request): Json<StopRequest>,
) -> Result<Json<StopResponse>> {
    if state.cancel_stream(request.stream_id) {
        Ok(Json(StopResponse { stopped: true }))
    } else {
        Err(ServerError::NotFound(format!(
            "stream {}",
            request.stream_id
        )))
    }
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
    use taliesin_llm::MockBackend;
    use tower::ServiceExt;

    use crate::config::ServerConfig;

    fn state() -> AppState {
        AppState::new(
            Arc::new(MockBackend::with_text("x")),
            ServerConfig::default(),
        )
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/streams/stop", post(stop_stream_handler))
            .with_state(state)
    }

    async fn stop(state: AppState, id: Uuid) -> StatusCode {
        app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/streams/stop")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "stream_id": id }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_stop_cancels_registered_stream() {
        let state = state();
        let (id, token) = state.register_stream();

        assert_eq!(stop(state.clone(), id).await, StatusCode::OK);
        assert!(token.is_cancelled());
        assert_eq!(state.active_streams(), 0);
    }

    #[tokio::test]
    async fn test_stop_unknown_stream_is_404() {
        assert_eq!(
            stop(state(), Uuid::new_v4()).await,
            StatusCode::NOT_FOUND
        );
    }
}
