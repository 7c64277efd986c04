//! Bounded-concurrency scheduling and streaming write sessions.
//!
//! This crate turns a batch of chunk generations into a single ordered frame
//! stream:
//!
//! ```text
//!   ChunkTask ──┐
//!   ChunkTask ──┼─▶ run_bounded ─▶ round snapshots ─▶ FrameBuilder ─▶ frames
//!   ChunkTask ──┘      (limit)        (per round)       (init/delta)
//! ```
//!
//! Tasks advance cooperatively in deterministic round-robin order under a
//! concurrency cap. [`start_session`] wires the pieces together: it assembles
//! a display snapshot per round, delta-encodes it against the previous one,
//! throttles and deduplicates emissions, and honors cancellation.

pub mod error;
pub mod scheduler;
pub mod session;
pub mod task;

pub use error::{EngineError, Result};
pub use scheduler::run_bounded;
pub use session::{
    start_session, FrameBuilder, SessionConfig, SessionRequest, SessionStream,
};
pub use task::{ChunkTask, StepOutcome, Steppable, TaskOutput, TaskProgress};
