//! The alignment reconciler.
//!
//! An upstream process (free-text generation constrained to emit indices)
//! proposes a correspondence from plot-chunk indices to text-chunk indices.
//! The proposal is sparse and frequently malformed: keys or values may not be
//! numbers, indices may be out of range, and claimed positions may regress.
//! The reconciler forces whatever survives cleaning into a total,
//! order-preserving partition of both index ranges — by attaching, clamping
//! and discarding, never by rejecting the whole alignment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// AlignmentGroup
// ─────────────────────────────────────────────────────────────────────────────

/// One group of the reconciled alignment: a contiguous run of plot indices
/// that owns a contiguous run of text indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentGroup {
    /// Plot-chunk indices in this group, ascending.
    pub plot_indices: Vec<usize>,
    /// Text-chunk indices owned by this group, ascending.
    pub text_indices: Vec<usize>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Cleaning
// ─────────────────────────────────────────────────────────────────────────────

/// Extract a well-typed partial map from a raw JSON correspondence.
///
/// Keys and list entries that do not parse as integers, or whose index is out
/// of range, are discarded. Entries left with no candidates are dropped
/// entirely (the walk treats them as missing).
pub fn clean_alignment(
    raw: &Value,
    plot_count: usize,
    text_count: usize,
) -> BTreeMap<usize, Vec<usize>> {
    let mut cleaned = BTreeMap::new();
    let Some(object) = raw.as_object() else {
        tracing::debug!("raw alignment is not an object, treating as empty");
        return cleaned;
    };

    for (key, value) in object {
        let Some(plot) = parse_index(key) else {
            continue;
        };
        if plot >= plot_count {
            continue;
        }

        let candidates: Vec<usize> = value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(parse_value_index)
                    .filter(|&t| t < text_count)
                    .collect()
            })
            .unwrap_or_default();

        if !candidates.is_empty() {
            cleaned.insert(plot, candidates);
        }
    }

    cleaned
}

fn parse_index(key: &str) -> Option<usize> {
    key.trim().parse().ok()
}

fn parse_value_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => parse_index(s),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reconciliation walk
// ─────────────────────────────────────────────────────────────────────────────

/// Force a cleaned partial map into a total, monotonic alignment.
///
/// The result partitions `[0, plot_count)` and `[0, text_count)` into
/// contiguous, non-overlapping groups with both sides non-decreasing:
///
/// - plot index 0 always anchors text index 0 (forced if the map disagrees)
/// - an unmapped plot index joins the current group
/// - a mapping at or below the current anchor joins the current group
///   (regressions are clamped, not rejected)
/// - a forward mapping closes the current group — extending its text range up
///   to the new anchor, exclusive — and opens a new one
/// - the final group is extended through `text_count - 1`
pub fn reconcile(
    map: &BTreeMap<usize, Vec<usize>>,
    plot_count: usize,
    text_count: usize,
) -> Vec<AlignmentGroup> {
    if plot_count == 0 {
        return Vec::new();
    }

    // The first plot chunk always anchors the first text chunk.
    let mut map = map.clone();
    let anchored = map.get(&0).and_then(|v| v.first()).is_some_and(|&t| t == 0);
    if !anchored {
        map.insert(0, vec![0]);
    }

    let last_text = text_count.saturating_sub(1);
    let mut groups: Vec<AlignmentGroup> = Vec::new();

    for plot in 0..plot_count {
        let target = map.get(&plot).and_then(|v| v.first()).copied();

        let Some(raw_target) = target else {
            if let Some(open) = groups.last_mut() {
                open.plot_indices.push(plot);
            }
            continue;
        };
        let target = raw_target.min(last_text);

        match groups.last_mut() {
            None => groups.push(AlignmentGroup {
                plot_indices: vec![plot],
                text_indices: if text_count == 0 { Vec::new() } else { vec![target] },
            }),
            Some(open) => {
                let anchor = open.text_indices.first().copied().unwrap_or(0);
                if target <= anchor {
                    // Same anchor, or a regression: clamp into the open group.
                    open.plot_indices.push(plot);
                } else {
                    open.text_indices.extend(anchor + 1..target);
                    groups.push(AlignmentGroup {
                        plot_indices: vec![plot],
                        text_indices: vec![target],
                    });
                }
            }
        }
    }

    if let Some(last) = groups.last_mut()
        && let Some(&anchor) = last.text_indices.first()
    {
        last.text_indices.extend(anchor + 1..text_count);
    }

    groups
}

/// Clean a raw JSON correspondence and reconcile it in one step.
pub fn reconcile_raw(raw: &Value, plot_count: usize, text_count: usize) -> Vec<AlignmentGroup> {
    let cleaned = clean_alignment(raw, plot_count, text_count);
    reconcile(&cleaned, plot_count, text_count)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
