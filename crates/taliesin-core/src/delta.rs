//! The prefix-delta diff engine.
//!
//! Generation is append-only per chunk within one streaming session, so the
//! minimal update between two snapshots is the per-chunk appended tail. When
//! the shapes differ or any chunk fails the prefix test, the diff degrades to
//! a full resend — never a partial or incorrect delta.

use serde::{Deserialize, Serialize};

use crate::chunk::{Row, Snapshot};

// ─────────────────────────────────────────────────────────────────────────────
// Delta Kind
// ─────────────────────────────────────────────────────────────────────────────

/// How a frame's payload relates to the previously emitted snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaKind {
    /// The payload is a complete, standalone snapshot.
    #[serde(rename = "init")]
    Full,
    /// The payload carries only the per-chunk appended tails.
    Delta,
}

// ─────────────────────────────────────────────────────────────────────────────
// compute_delta
// ─────────────────────────────────────────────────────────────────────────────

/// Compute the minimal update from `previous` to `current`.
///
/// Returns `(DeltaKind::Full, current)` when there is no previous snapshot,
/// when the two snapshots differ in shape, or when any current chunk does not
/// start with its previous counterpart. Otherwise returns
/// `(DeltaKind::Delta, suffixes)` where each chunk is the tail appended since
/// `previous`.
///
/// Pure function; the caller retains `current` to diff against next time.
pub fn compute_delta(previous: Option<&Snapshot>, current: &Snapshot) -> (DeltaKind, Snapshot) {
    let Some(previous) = previous else {
        return (DeltaKind::Full, current.clone());
    };

    if !previous.shape_matches(current) {
        tracing::debug!(
            prev_rows = previous.len(),
            curr_rows = current.len(),
            "snapshot shape changed, falling back to full resend"
        );
        return (DeltaKind::Full, current.clone());
    }

    let mut suffixes = Vec::with_capacity(current.len());
    for (prev_row, curr_row) in previous.rows().iter().zip(current.rows()) {
        let mut row = Vec::with_capacity(curr_row.arity());
        for (prev_chunk, curr_chunk) in prev_row.chunks().iter().zip(curr_row.chunks()) {
            match curr_chunk.strip_prefix(prev_chunk.as_str()) {
                Some(tail) => row.push(tail.to_string()),
                None => {
                    // A chunk was rewritten rather than extended.
                    tracing::debug!("prefix test failed, falling back to full resend");
                    return (DeltaKind::Full, current.clone());
                }
            }
        }
        suffixes.push(Row(row));
    }

    (DeltaKind::Delta, Snapshot(suffixes))
}

/// Apply a delta payload onto a base snapshot, reproducing the snapshot the
/// delta was computed against. The shapes must match; mismatched positions
/// keep the base chunk.
pub fn apply_delta(base: &Snapshot, delta: &Snapshot) -> Snapshot {
    Snapshot(
        base.rows()
            .iter()
            .zip(delta.rows())
            .map(|(base_row, delta_row)| {
                Row(base_row
                    .chunks()
                    .iter()
                    .zip(delta_row.chunks())
                    .map(|(b, d)| format!("{b}{d}"))
                    .collect())
            })
            .collect(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// DeltaFrame
// ─────────────────────────────────────────────────────────────────────────────

/// One emitted unit of the incremental wire protocol.
///
/// A `delta` frame's payload, appended chunk-wise onto the previously emitted
/// snapshot, reproduces the new snapshot exactly; an `init` frame's payload
/// stands alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaFrame {
    /// Whether this is the terminal frame of the session.
    pub done: bool,
    /// Payload interpretation.
    #[serde(rename = "chunk_type")]
    pub kind: DeltaKind,
    /// Full rows for `init`, suffix-only rows for `delta`.
    #[serde(rename = "chunk_list")]
    pub chunks: Snapshot,
    /// Optional human-readable progress message.
    pub msg: Option<String>,
}

impl DeltaFrame {
    /// Create a standalone full-snapshot frame.
    pub fn full(chunks: Snapshot, done: bool, msg: Option<String>) -> Self {
        Self {
            done,
            kind: DeltaKind::Full,
            chunks,
            msg,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
