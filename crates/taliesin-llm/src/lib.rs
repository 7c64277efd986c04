//! Generation backend abstraction for Taliesin.
//!
//! The engine treats text generation as an opaque, resumable computation: a
//! backend receives one chunk plus its context and returns a stream of
//! incremental text deltas ending in a terminal output (final text, cost,
//! token usage) or an error.
//!
//! The core abstraction is the [`GenerationBackend`] trait:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  GenerationBackend trait                     │
//! │  - generate() -> Stream<GenerationEvent>     │
//! │  - health_check()                            │
//! └──────────────────────────────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//!   ┌─────────────┐        ┌──────────────┐
//!   │ EchoBackend │        │ MockBackend  │
//!   │ (offline)   │        │ (tests)      │
//!   └─────────────┘        └──────────────┘
//! ```
//!
//! Real provider HTTP glue lives behind this seam in downstream crates; this
//! crate ships the trait, a deterministic offline backend, and a scripted
//! mock for tests.

pub mod backend;
pub mod error;
pub mod types;

pub use backend::{
    EchoBackend, GenerationBackend, GenerationEvent, GenerationStream, MockBackend, MockScript,
    SharedBackend, with_retry,
};
pub use error::{GenerationError, Result};
pub use types::{GenerationOutput, GenerationRequest, TokenUsage};
