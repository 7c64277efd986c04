//! Chunk synchronization primitives for Taliesin.
//!
//! This crate holds the pure parts of the engine:
//!
//! - the chunk model: [`Snapshot`]/[`Row`] value types and the append-only
//!   [`GrowingText`] handle that makes the "generation only appends" invariant
//!   a type property rather than a caller convention
//! - the prefix-delta diff engine ([`compute_delta`]) that produces minimal
//!   incremental updates between successive snapshots
//! - the alignment reconciler ([`reconcile`]) that forces a sparse, noisy
//!   index correspondence between two chunkings into a total monotonic
//!   partition
//!
//! Everything here is synchronous and side-effect free; the async wiring
//! lives in `taliesin-engine`.

pub mod align;
pub mod chunk;
pub mod delta;

pub use align::{AlignmentGroup, clean_alignment, reconcile, reconcile_raw};
pub use chunk::{ChunkPair, GrowingText, Row, Snapshot};
pub use delta::{DeltaFrame, DeltaKind, apply_delta, compute_delta};
