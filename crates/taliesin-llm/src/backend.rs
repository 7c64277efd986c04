//! Generation backend trait and local implementations.
//!
//! A backend exposes one chunk's generation as a resumable stream: zero or
//! more [`GenerationEvent::Delta`]s followed by a terminal
//! [`GenerationEvent::Completed`]. The engine drives many such streams under
//! a concurrency cap; each stream read is the task's suspension point.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{GenerationError, Result};
use crate::types::{GenerationOutput, GenerationRequest, TokenUsage};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Run a backend call, retrying transient failures with exponential backoff.
///
/// Only errors that report [`GenerationError::is_retryable`] are retried; any
/// other error is returned as-is. The final attempt's error is returned when
/// every attempt fails.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if !err.is_retryable() || attempt >= max_retries {
            return Err(err);
        }
        attempt += 1;
        tracing::warn!(
            backend = backend_name,
            attempt,
            max_retries,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "Generation call failed, retrying"
        );
        tokio::time::sleep(backoff).await;
        backoff *= 2;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming Types
// ─────────────────────────────────────────────────────────────────────────────

/// A streaming response for one chunk's generation.
pub type GenerationStream = Pin<Box<dyn Stream<Item = Result<GenerationEvent>> + Send + 'static>>;

/// Events emitted while a chunk is being generated.
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    /// A piece of newly generated text (appended to everything before it).
    Delta(String),
    /// Generation finished; carries the terminal output.
    Completed(GenerationOutput),
}

impl GenerationEvent {
    /// Returns true if this is the terminal event of a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationEvent::Completed(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Generation Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for generation backend providers.
///
/// Implementations connect the engine to an actual text-generation service.
/// The engine only assumes that a stream yields deltas in order and ends with
/// a `Completed` event; a stream that ends without one is treated as
/// truncated by the caller.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Start generating for one chunk, returning a stream of events.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationStream>;

    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Check if the backend is available and properly configured.
    async fn health_check(&self) -> Result<()>;
}

/// A backend that can be shared across tasks.
pub type SharedBackend = Arc<dyn GenerationBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Echo Backend
// ─────────────────────────────────────────────────────────────────────────────

/// A deterministic offline backend that streams the source chunk back in
/// fixed-size pieces.
///
/// Useful for running the server without credentials: the frame pipeline,
/// scheduling and diffing all behave exactly as with a real provider, at zero
/// cost.
#[derive(Debug, Clone)]
pub struct EchoBackend {
    model: String,
    piece_chars: usize,
}

impl EchoBackend {
    /// Create an echo backend emitting `piece_chars` characters per delta.
    pub fn new(piece_chars: usize) -> Self {
        Self {
            model: "echo".to_string(),
            piece_chars: piece_chars.max(1),
        }
    }
}

impl Default for EchoBackend {
    fn default() -> Self {
        Self::new(16)
    }
}

#[async_trait]
impl GenerationBackend for EchoBackend {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationStream> {
        let chars: Vec<char> = request.source.chars().collect();
        let mut events: Vec<Result<GenerationEvent>> = chars
            .chunks(self.piece_chars)
            .map(|piece| Ok(GenerationEvent::Delta(piece.iter().collect())))
            .collect();

        let completion_tokens = chars.len() as u32;
        events.push(Ok(GenerationEvent::Completed(
            GenerationOutput::new(request.source, &self.model, TokenUsage::new(0, completion_tokens)),
        )));

        Ok(Box::pin(futures::stream::iter(events)))
    }

    fn name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// A scripted sequence of events for one [`MockBackend`] generation call.
#[derive(Debug, Clone)]
pub struct MockScript {
    deltas: Vec<String>,
    result: Result<GenerationOutput>,
}

impl MockScript {
    /// A script that streams `deltas` and completes with their concatenation.
    pub fn deltas(deltas: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let deltas: Vec<String> = deltas.into_iter().map(Into::into).collect();
        let text: String = deltas.concat();
        let tokens = text.chars().count() as u32;
        Self {
            deltas,
            result: Ok(GenerationOutput::new(text, "mock-model", TokenUsage::new(10, tokens))),
        }
    }

    /// A script that streams the whole text as a single delta.
    pub fn text(text: impl Into<String>) -> Self {
        Self::deltas([text.into()])
    }

    /// A script that streams `deltas` and then fails with `error`.
    pub fn failing(
        deltas: impl IntoIterator<Item = impl Into<String>>,
        error: GenerationError,
    ) -> Self {
        Self {
            deltas: deltas.into_iter().map(Into::into).collect(),
            result: Err(error),
        }
    }

    /// Override the terminal output.
    pub fn with_output(mut self, output: GenerationOutput) -> Self {
        self.result = Ok(output);
        self
    }
}

/// A mock backend for testing purposes.
///
/// Scripts are consumed in order, one per `generate` call. If more calls are
/// made than scripts available, an error is returned.
#[derive(Debug, Default)]
pub struct MockBackend {
    scripts: std::sync::Mutex<Vec<MockScript>>,
    request_log: std::sync::Mutex<Vec<GenerationRequest>>,
    healthy: bool,
}

impl MockBackend {
    /// Create a mock backend with the given scripts.
    pub fn new(scripts: Vec<MockScript>) -> Self {
        Self {
            scripts: std::sync::Mutex::new(scripts),
            request_log: std::sync::Mutex::new(Vec::new()),
            healthy: true,
        }
    }

    /// Create a mock backend answering every call with the same single text.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![MockScript::text(text)])
    }

    /// Create a mock backend whose health check fails.
    pub fn unhealthy() -> Self {
        Self {
            scripts: std::sync::Mutex::new(Vec::new()),
            request_log: std::sync::Mutex::new(Vec::new()),
            healthy: false,
        }
    }

    /// Get all requests that were made to this backend.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.request_log.lock().unwrap().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationStream> {
        self.request_log.lock().unwrap().push(request);

        let script = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                return Err(GenerationError::Backend(
                    "MockBackend: no more scripts available".to_string(),
                ));
            }
            scripts.remove(0)
        };

        let mut events: Vec<Result<GenerationEvent>> = script
            .deltas
            .into_iter()
            .map(|d| Ok(GenerationEvent::Delta(d)))
            .collect();
        match script.result {
            Ok(output) => events.push(Ok(GenerationEvent::Completed(output))),
            Err(e) => events.push(Err(e)),
        }

        Ok(Box::pin(futures::stream::iter(events)))
    }

    fn name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> Result<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(GenerationError::Network("mock backend offline".to_string()))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn drain(mut stream: GenerationStream) -> Vec<Result<GenerationEvent>> {
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_echo_backend_streams_source_in_pieces() {
        let backend = EchoBackend::new(3);
        let request = GenerationRequest::new("echo", "abcdefgh", 100);

        let events = drain(backend.generate(request).await.unwrap()).await;

        // 3 pieces + completion
        assert_eq!(events.len(), 4);
        let mut text = String::new();
        for event in &events[..3] {
            match event.as_ref().unwrap() {
                GenerationEvent::Delta(d) => text.push_str(d),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(text, "abcdefgh");

        match events[3].as_ref().unwrap() {
            GenerationEvent::Completed(output) => {
                assert_eq!(output.text, "abcdefgh");
                assert_eq!(output.cost, 0.0);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_echo_backend_multibyte_boundaries() {
        let backend = EchoBackend::new(2);
        let request = GenerationRequest::new("echo", "一二三四五", 100);

        let events = drain(backend.generate(request).await.unwrap()).await;
        let text: String = events
            .iter()
            .filter_map(|e| match e.as_ref().unwrap() {
                GenerationEvent::Delta(d) => Some(d.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "一二三四五");
    }

    #[tokio::test]
    async fn test_mock_backend_scripted_events() {
        let backend = MockBackend::new(vec![MockScript::deltas(["Once ", "upon ", "a time"])]);
        let request = GenerationRequest::new("m", "src", 100);

        let events = drain(backend.generate(request).await.unwrap()).await;
        assert_eq!(events.len(), 4);
        assert!(events[3].as_ref().unwrap().is_terminal());
        match events[3].as_ref().unwrap() {
            GenerationEvent::Completed(output) => assert_eq!(output.text, "Once upon a time"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_backend_failing_script() {
        let backend = MockBackend::new(vec![MockScript::failing(
            ["partial "],
            GenerationError::Backend("boom".to_string()),
        )]);

        let events = drain(
            backend
                .generate(GenerationRequest::new("m", "src", 100))
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(events[1].is_err());
    }

    #[tokio::test]
    async fn test_mock_backend_exhausted() {
        let backend = MockBackend::new(vec![]);
        let result = backend
            .generate(GenerationRequest::new("m", "src", 100))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_backend_health() {
        assert!(MockBackend::with_text("x").health_check().await.is_ok());
        assert!(MockBackend::unhealthy().health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_on_fatal_errors() {
        let mut calls = 0u32;
        let result: Result<()> = with_retry(3, Duration::from_millis(1), "test", || {
            calls += 1;
            async { Err(GenerationError::Config("fatal".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(GenerationError::Config(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_with_retry_retries_network_errors() {
        let mut calls = 0u32;
        let result = with_retry(3, Duration::from_millis(1), "test", || {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt < 3 {
                    Err(GenerationError::Network("flaky".to_string()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }
}
