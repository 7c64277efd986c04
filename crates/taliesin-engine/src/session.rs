//! Streaming write sessions.
//!
//! A session takes a batch of `[source, generated]` rows, regenerates the
//! requested span under a concurrency cap, and emits wire frames describing
//! the evolving state. Frames are delta-encoded against the previously
//! emitted snapshot and deduplicated when a round produced no visible change.
//! Rounds that land inside the minimum emit interval are dropped rather than
//! queued; the terminal frame always carries the complete final state.

use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use taliesin_core::{compute_delta, ChunkPair, DeltaFrame, Row, Snapshot};
use taliesin_llm::{GenerationRequest, SharedBackend};

use crate::error::{EngineError, Result};
use crate::scheduler::run_bounded;
use crate::task::{ChunkTask, TaskOutput, TaskProgress};

// ─────────────────────────────────────────────────────────────────────────────
// Frame Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Stateful wrapper around the diff engine.
///
/// Holds the last emitted snapshot so each call only has to supply the
/// current one. The first call always produces an `init` frame; later calls
/// produce `delta` frames while the append-only contract holds and fall back
/// to `init` when it does not.
#[derive(Debug, Default)]
pub struct FrameBuilder {
    previous: Option<Snapshot>,
}

impl FrameBuilder {
    /// Create a builder with no emission history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the next wire frame for `current`.
    ///
    /// Chunks are trimmed to canonical form before diffing, so trailing
    /// whitespace churn never forces a full resend.
    pub fn frame(&mut self, current: &Snapshot, done: bool, msg: Option<String>) -> DeltaFrame {
        let canonical = current.canonical();
        let (kind, payload) = compute_delta(self.previous.as_ref(), &canonical);
        self.previous = Some(canonical);
        DeltaFrame {
            done,
            kind,
            chunks: payload,
            msg,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Request / Config
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters for one write session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// The document rows, source plus any existing generated text.
    pub rows: Vec<ChunkPair>,
    /// Row range to regenerate. `None` means every row.
    pub span: Option<std::ops::Range<usize>>,
    /// Shared context passed to every generation request.
    pub context: String,
    /// Model name passed to the backend.
    pub model: String,
    /// Maximum tokens per chunk.
    pub max_tokens: u32,
    /// Concurrent generation cap for this session.
    pub concurrency: usize,
}

impl SessionRequest {
    /// Create a request regenerating all of `rows`.
    pub fn new(model: impl Into<String>, rows: Vec<ChunkPair>) -> Self {
        Self {
            rows,
            span: None,
            context: String::new(),
            model: model.into(),
            max_tokens: 2048,
            concurrency: 3,
        }
    }

    /// Restrict regeneration to a row range; rows outside keep their text.
    pub fn with_span(mut self, span: std::ops::Range<usize>) -> Self {
        self.span = Some(span);
        self
    }

    /// Set the shared context string.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Set the concurrent generation cap.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the per-chunk token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.rows.is_empty() {
            return Err(EngineError::InvalidRequest("no rows to write".to_string()));
        }
        if let Some(span) = &self.span {
            if span.start >= span.end || span.end > self.rows.len() {
                return Err(EngineError::InvalidRequest(format!(
                    "span {}..{} out of range for {} rows",
                    span.start,
                    span.end,
                    self.rows.len()
                )));
            }
        }
        Ok(())
    }
}

/// Tunables for session emission.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Minimum interval between emitted frames.
    pub min_emit_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_emit_interval: Duration::from_millis(200),
        }
    }
}

impl SessionConfig {
    /// Set the minimum interval between emitted frames.
    pub fn with_min_emit_interval(mut self, interval: Duration) -> Self {
        self.min_emit_interval = interval;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Stream
// ─────────────────────────────────────────────────────────────────────────────

/// A boxed stream of wire frames.
pub type SessionStream = Pin<Box<dyn Stream<Item = DeltaFrame> + Send + 'static>>;

/// One display row: source, text before this session, text so far.
struct RowSlot {
    source: String,
    prior: String,
    /// Index into the task batch, for rows being regenerated.
    task: Option<usize>,
}

fn assemble(slots: &[RowSlot], task_texts: &[String]) -> Snapshot {
    Snapshot::new(
        slots
            .iter()
            .map(|slot| {
                let now = match slot.task {
                    Some(task) => task_texts.get(task).cloned().unwrap_or_default(),
                    None => slot.prior.clone(),
                };
                Row::new([slot.source.clone(), slot.prior.clone(), now])
            })
            .collect(),
    )
}

enum SessionUpdate {
    Progress(Snapshot),
    Finished { snapshot: Snapshot, failed: usize },
}

/// Owns the scheduler task so generation stops when the frame stream is
/// dropped, not just when the session is cancelled explicitly.
struct DriverGuard(tokio::task::JoinHandle<()>);

impl DriverGuard {
    fn abort(&self) {
        self.0.abort();
    }
}

impl Drop for DriverGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Start a write session, returning its frame stream.
///
/// The backend is health-checked up front so an unreachable backend fails
/// here, before any frame exists. Task failures after this point never fail
/// the session; they surface as error text in the terminal frame.
pub async fn start_session(
    backend: SharedBackend,
    request: SessionRequest,
    config: SessionConfig,
    cancellation: CancellationToken,
) -> Result<SessionStream> {
    request.validate()?;
    backend.health_check().await?;

    let span = request.span.clone().unwrap_or(0..request.rows.len());

    // Continuation markers are part of what the backend sees, never part of
    // what the client displays.
    let marked = Snapshot::new(
        request
            .rows
            .iter()
            .map(|pair| Row::new([pair.source.clone()]))
            .collect(),
    )
    .with_continuation_markers();

    let mut slots = Vec::with_capacity(request.rows.len());
    let mut tasks = Vec::new();
    for (index, pair) in request.rows.iter().enumerate() {
        let task = if span.contains(&index) {
            let source = marked.rows()[index].chunks()[0].clone();
            let generation = GenerationRequest::new(&request.model, source, request.max_tokens)
                .with_current(pair.generated.as_str())
                .with_context(&request.context);
            tasks.push(ChunkTask::new(backend.clone(), generation));
            Some(tasks.len() - 1)
        } else {
            None
        };
        slots.push(RowSlot {
            source: pair.source.clone(),
            prior: pair.generated.as_str().to_string(),
            task,
        });
    }

    tracing::info!(
        rows = slots.len(),
        tasks = tasks.len(),
        concurrency = request.concurrency,
        model = %request.model,
        "Starting write session"
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<SessionUpdate>();
    let concurrency = request.concurrency;
    let driver = DriverGuard(tokio::spawn(async move {
        let finals: Vec<TaskOutput> = run_bounded(tasks, concurrency, |latest| {
            let texts: Vec<String> = latest
                .iter()
                .map(|progress: &Option<TaskProgress>| {
                    progress.as_ref().map(|p| p.text.clone()).unwrap_or_default()
                })
                .collect();
            let _ = tx.send(SessionUpdate::Progress(assemble(&slots, &texts)));
        })
        .await;

        let failed = finals.iter().filter(|f| !f.is_success()).count();
        let texts: Vec<String> = finals.iter().map(|f| f.text.clone()).collect();
        let _ = tx.send(SessionUpdate::Finished {
            snapshot: assemble(&slots, &texts),
            failed,
        });
    }));

    let min_interval = config.min_emit_interval;
    let stream = async_stream::stream! {
        let mut builder = FrameBuilder::new();
        let mut last_progress: Option<Snapshot> = None;
        let mut last_emit: Option<Instant> = None;

        loop {
            let update = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    driver.abort();
                    tracing::info!("Write session cancelled");
                    let last = last_progress.take().unwrap_or_default();
                    yield builder.frame(&last, true, Some("stream cancelled".to_string()));
                    return;
                }
                update = rx.recv() => update,
            };

            match update {
                Some(SessionUpdate::Progress(snapshot)) => {
                    let canonical = snapshot.canonical();
                    if last_progress.as_ref() == Some(&canonical) {
                        continue;
                    }
                    // Drop, never delay: a round arriving inside the emit
                    // interval is superseded by a later one, and the terminal
                    // frame carries the complete final state regardless.
                    if let Some(at) = last_emit
                        && at.elapsed() < min_interval
                    {
                        continue;
                    }
                    last_emit = Some(Instant::now());
                    last_progress = Some(canonical);
                    yield builder.frame(&snapshot, false, None);
                }
                Some(SessionUpdate::Finished { snapshot, failed }) => {
                    let msg = if failed > 0 {
                        Some(format!("{failed} chunk(s) failed"))
                    } else {
                        None
                    };
                    if failed > 0 {
                        tracing::warn!(failed, "Write session finished with failures");
                    }
                    yield builder.frame(&snapshot, true, msg);
                    return;
                }
                None => {
                    // Driver gone without a terminal update.
                    let last = last_progress.take().unwrap_or_default();
                    yield builder.frame(&last, true, Some("session aborted".to_string()));
                    return;
                }
            }
        }
    };

    Ok(Box::pin(stream))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
