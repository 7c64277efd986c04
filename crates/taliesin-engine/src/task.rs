//! Resumable generation tasks.
//!
//! A task advances one suspension point at a time. The scheduler owns the
//! policy of who advances when; the task only knows how to take a single
//! step and what it has produced so far.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use taliesin_llm::{
    GenerationError, GenerationEvent, GenerationOutput, GenerationRequest, GenerationStream,
    SharedBackend, with_retry,
};

/// Transient backend failures when opening a stream are retried this many
/// times before the chunk is marked failed.
const START_RETRIES: u32 = 2;
const START_BACKOFF: Duration = Duration::from_millis(250);

// ─────────────────────────────────────────────────────────────────────────────
// Steppable
// ─────────────────────────────────────────────────────────────────────────────

/// The result of advancing a task by one step.
#[derive(Debug, Clone)]
pub enum StepOutcome<Y, F> {
    /// The task suspended with an intermediate value.
    Yielded(Y),
    /// The task finished with its terminal value.
    Done(F),
}

/// A cooperative task that advances one suspension point per call.
///
/// `step` must not be called again after it returns `Done`; the scheduler
/// upholds this.
#[async_trait]
pub trait Steppable: Send {
    /// Intermediate value produced at each suspension point.
    type Yield: Send;
    /// Terminal value produced when the task finishes.
    type Final: Send;

    /// Advance the task to its next suspension point.
    async fn step(&mut self) -> StepOutcome<Self::Yield, Self::Final>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Chunk Task
// ─────────────────────────────────────────────────────────────────────────────

/// Progress emitted at each suspension point of a [`ChunkTask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProgress {
    /// Everything generated for this chunk so far.
    pub text: String,
}

/// Terminal state of a [`ChunkTask`].
///
/// A failed task is still a completed task as far as the scheduler is
/// concerned; the error rides in here instead of aborting the run.
#[derive(Debug, Clone)]
pub struct TaskOutput {
    /// Final display text for the chunk. For a failed task this is the
    /// error message.
    pub text: String,
    /// Backend output, present only on success.
    pub output: Option<GenerationOutput>,
    /// Error message, present only on failure.
    pub error: Option<String>,
}

impl TaskOutput {
    fn completed(output: GenerationOutput) -> Self {
        Self {
            text: output.text.clone(),
            output: Some(output),
            error: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            text: message.clone(),
            output: None,
            error: Some(message),
        }
    }

    /// Returns true if the task finished without error.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// One chunk's generation as a steppable task.
///
/// The backend call is made lazily on the first step, so building a batch of
/// tasks costs nothing until the scheduler admits them. Each subsequent step
/// reads exactly one event from the stream.
pub struct ChunkTask {
    backend: SharedBackend,
    request: Option<GenerationRequest>,
    stream: Option<GenerationStream>,
    generated: String,
}

impl ChunkTask {
    /// Create a task for one chunk.
    pub fn new(backend: SharedBackend, request: GenerationRequest) -> Self {
        Self {
            backend,
            request: Some(request),
            stream: None,
            generated: String::new(),
        }
    }
}

#[async_trait]
impl Steppable for ChunkTask {
    type Yield = TaskProgress;
    type Final = TaskOutput;

    async fn step(&mut self) -> StepOutcome<TaskProgress, TaskOutput> {
        if let Some(request) = self.request.take() {
            let opened = with_retry(START_RETRIES, START_BACKOFF, self.backend.name(), || {
                self.backend.generate(request.clone())
            })
            .await;
            match opened {
                Ok(stream) => self.stream = Some(stream),
                Err(e) => {
                    tracing::warn!(error = %e, "Chunk generation failed to start");
                    return StepOutcome::Done(TaskOutput::failed(e.to_string()));
                }
            }
        }

        let Some(stream) = self.stream.as_mut() else {
            return StepOutcome::Done(TaskOutput::failed(
                "task stepped after completion".to_string(),
            ));
        };

        match stream.next().await {
            Some(Ok(GenerationEvent::Delta(delta))) => {
                self.generated.push_str(&delta);
                StepOutcome::Yielded(TaskProgress {
                    text: self.generated.clone(),
                })
            }
            Some(Ok(GenerationEvent::Completed(output))) => {
                self.stream = None;
                StepOutcome::Done(TaskOutput::completed(output))
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Chunk generation failed mid-stream");
                self.stream = None;
                StepOutcome::Done(TaskOutput::failed(e.to_string()))
            }
            None => {
                self.stream = None;
                let err = GenerationError::Truncated("no terminal output".to_string());
                tracing::warn!(error = %err, "Chunk generation truncated");
                StepOutcome::Done(TaskOutput::failed(err.to_string()))
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
