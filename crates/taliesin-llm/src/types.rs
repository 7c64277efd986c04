//! Request and output types for the generation backend seam.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Generation Request
// ─────────────────────────────────────────────────────────────────────────────

/// A request to generate (or extend) the output for one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The model to use.
    pub model: String,

    /// The source chunk this request transforms.
    pub source: String,

    /// Existing generated text for this chunk (empty for fresh generation;
    /// backends extend rather than rewrite it).
    #[serde(default)]
    pub current: String,

    /// Surrounding context: instructions, global summary, neighbor chunks.
    #[serde(default)]
    pub context: String,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Temperature for sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    /// Create a request for a source chunk with no prior output.
    pub fn new(model: impl Into<String>, source: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            source: source.into(),
            current: String::new(),
            context: String::new(),
            max_tokens,
            temperature: None,
        }
    }

    /// Set the existing generated text to extend.
    pub fn with_current(mut self, current: impl Into<String>) -> Self {
        self.current = current.into();
        self
    }

    /// Set the surrounding context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Generation Output
// ─────────────────────────────────────────────────────────────────────────────

/// Token usage for one generation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens produced by the completion.
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Create a usage record.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    /// Total tokens in and out.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// The terminal result of one generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// The complete generated text.
    pub text: String,
    /// The model that produced it.
    pub model: String,
    /// Cost of the call in the provider's currency.
    pub cost: f64,
    /// Currency symbol for the cost.
    pub currency: String,
    /// Token usage.
    pub usage: TokenUsage,
}

impl GenerationOutput {
    /// Create an output record.
    pub fn new(text: impl Into<String>, model: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            cost: 0.0,
            currency: String::new(),
            usage,
        }
    }

    /// Set the cost and currency symbol.
    pub fn with_cost(mut self, cost: f64, currency: impl Into<String>) -> Self {
        self.cost = cost;
        self.currency = currency.into();
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("bard-1", "a paragraph", 512)
            .with_context("chapter summary")
            .with_current("already written")
            .with_temperature(0.7);

        assert_eq!(request.model, "bard-1");
        assert_eq!(request.source, "a paragraph");
        assert_eq!(request.current, "already written");
        assert_eq!(request.context, "chapter summary");
        assert_eq!(request.temperature, Some(0.7));
    }

    #[test]
    fn test_token_usage_total() {
        assert_eq!(TokenUsage::new(10, 20).total(), 30);
    }

    #[test]
    fn test_output_with_cost() {
        let output = GenerationOutput::new("text", "bard-1", TokenUsage::new(5, 7))
            .with_cost(0.0123, "$");
        assert_eq!(output.cost, 0.0123);
        assert_eq!(output.currency, "$");
    }

    #[test]
    fn test_request_serde_defaults() {
        let json = r#"{"model": "m", "source": "s", "max_tokens": 100}"#;
        let request: GenerationRequest = serde_json::from_str(json).unwrap();
        assert!(request.current.is_empty());
        assert!(request.context.is_empty());
        assert!(request.temperature.is_none());
    }
}
