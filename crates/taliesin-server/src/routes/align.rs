//! POST /api/v1/align - alignment reconciliation endpoint.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use taliesin_core::{reconcile_raw, AlignmentGroup};

use crate::error::Result;
use crate::state::AppState;

/// Request body for the align endpoint.
#[derive(Debug, Deserialize)]
pub struct AlignRequest {
    /// Raw model-produced alignment map, `plot index -> text indices`.
    /// Arbitrary JSON; junk entries are discarded, not rejected.
    pub alignment: serde_json::Value,

    /// Number of plot chunks.
    pub plot_count: usize,

    /// Number of text chunks.
    pub text_count: usize,
}

/// Response body for the align endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct AlignResponse {
    /// Contiguous groups covering both index spaces.
    pub groups: Vec<AlignmentGroup>,
}

/// POST /api/v1/align - clean and reconcile a raw alignment map.
pub async fn align_handler(
    State(_state): State<AppState>,
    Json(request): Json<AlignRequest>,
) -> Result<Json<AlignResponse>> {
    let groups = reconcile_raw(&request.alignment, request.plot_count, request.text_count);
    tracing::debug!(
        plot_count = request.plot_count,
        text_count = request.text_count,
        groups = groups.len(),
        "Reconciled alignment"
    );
    Ok(Json(AlignResponse { groups }))
}
