//! The document chunk model.
//!
//! A document under generation is an ordered list of [`Row`]s, each row a
//! small ordered group of chunk strings sharing one context (a source chunk
//! plus its generated variants). Snapshots are compared by value and replaced
//! whole — never mutated in place once handed to the diff engine.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// GrowingText
// ─────────────────────────────────────────────────────────────────────────────

/// An append-only text buffer.
///
/// Within one streaming session a chunk's generated text only ever grows at
/// the end; the prefix-delta diff is correct exactly as long as that holds.
/// `GrowingText` offers no mutation besides [`append`](Self::append), so a
/// rewrite of already-emitted text is unrepresentable instead of a silent
/// full-resend fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrowingText {
    text: String,
}

impl GrowingText {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer seeded with existing text.
    pub fn seeded(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Append a tail to the buffer.
    pub fn append(&mut self, tail: &str) {
        self.text.push_str(tail);
    }

    /// The full text accumulated so far.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The suffix appended since `earlier`, or `None` if this buffer does not
    /// extend `earlier` (i.e. the append-only assumption was violated across
    /// the two handles).
    pub fn suffix_from(&self, earlier: &GrowingText) -> Option<&str> {
        self.text.strip_prefix(earlier.text.as_str())
    }

    /// Consume the handle, yielding the accumulated text.
    pub fn into_string(self) -> String {
        self.text
    }
}

impl std::fmt::Display for GrowingText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<GrowingText> for String {
    fn from(g: GrowingText) -> Self {
        g.text
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ChunkPair
// ─────────────────────────────────────────────────────────────────────────────

/// One position in the document: the source chunk and the best generated
/// output for it so far (empty before generation starts).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkPair {
    /// The original/input chunk.
    pub source: String,
    /// The current generated output, growing append-only.
    pub generated: GrowingText,
}

impl ChunkPair {
    /// Create a pair with no generated text yet.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            generated: GrowingText::new(),
        }
    }

    /// Create a pair with pre-existing generated text.
    pub fn with_generated(source: impl Into<String>, generated: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            generated: GrowingText::seeded(generated),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row / Snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// An ordered group of chunk strings sharing one context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(pub Vec<String>);

impl Row {
    /// Create a row from chunk strings.
    pub fn new(chunks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(chunks.into_iter().map(Into::into).collect())
    }

    /// Number of chunks in the row.
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// The chunks, in order.
    pub fn chunks(&self) -> &[String] {
        &self.0
    }
}

/// A full chunk sequence at one point in time.
///
/// Insertion order is the only order; rows are replaced whole when they
/// change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(pub Vec<Row>);

impl Snapshot {
    /// Create a snapshot from rows.
    pub fn new(rows: Vec<Row>) -> Self {
        Self(rows)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot has no rows.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The rows, in order.
    pub fn rows(&self) -> &[Row] {
        &self.0
    }

    /// True when `other` has the same row count and per-row arity.
    pub fn shape_matches(&self, other: &Snapshot) -> bool {
        self.len() == other.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.arity() == b.arity())
    }

    /// The canonical form used for diffing and emission: every chunk with
    /// leading/trailing whitespace (including continuation markers) stripped.
    pub fn canonical(&self) -> Snapshot {
        Snapshot(
            self.0
                .iter()
                .map(|row| Row(row.0.iter().map(|c| c.trim().to_string()).collect()))
                .collect(),
        )
    }

    /// The generation form: canonical chunks with a trailing newline appended
    /// to every non-empty chunk of every row but the last, so that adjacent
    /// rows stay separable when their texts are concatenated downstream.
    pub fn with_continuation_markers(&self) -> Snapshot {
        let last = self.0.len().saturating_sub(1);
        Snapshot(
            self.0
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    Row(row
                        .0
                        .iter()
                        .map(|c| {
                            let trimmed = c.trim();
                            if !trimmed.is_empty() && i != last {
                                format!("{trimmed}\n")
                            } else {
                                trimmed.to_string()
                            }
                        })
                        .collect())
                })
                .collect(),
        )
    }

    /// Total character count across all chunks.
    pub fn char_count(&self) -> usize {
        self.0
            .iter()
            .flat_map(|row| row.0.iter())
            .map(|c| c.chars().count())
            .sum()
    }
}

impl FromIterator<Row> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Snapshot(iter.into_iter().collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
