//! Configuration for the [`Harness`](super::harness::Harness).
//!
//! ```ignore
//! let config = HarnessConfig::new("gpt-4o-mini", DEFAULT_SYSTEM_PROMPT)
//!     .with_max_rounds(6)
//!     .with_temperature(0.0);
//! ```
//!
//! Summarization is tuned through the struct field:
//!
//! ```ignore
//! let config = HarnessConfig {
//!     summarizer: SummarizerConfig { threshold: 20, ..Default::default() },
//!     ..HarnessConfig::default()
//! };
//! ```

use super::prompt::DEFAULT_SYSTEM_PROMPT;
use crate::api::retry::RetryConfig;
use crate::context::summarizer::SummarizerConfig;

/// Model rounds allowed per turn before the loop gives up.
pub const DEFAULT_MAX_ROUNDS: u32 = 10;

/// Final text when the loop ends without any assistant content.
pub const FALLBACK_RESPONSE: &str = "No response could be generated";

/// Configuration for a [`Harness`](super::harness::Harness) run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Sent as `model`. `None` for endpoints that fix the model in the URL.
    pub model: Option<String>,
    /// Prepended to every round; not stored and not counted by the gate.
    pub system_prompt: String,
    pub max_rounds: u32,
    /// 0 leaves the limit to the provider.
    pub max_tokens: u32,
    pub temperature: f32,
    /// Retry policy for model calls. No retries by default.
    pub retry: RetryConfig,
    pub summarizer: SummarizerConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            model: Some(crate::DEFAULT_MODEL.to_string()),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            max_tokens: 0,
            temperature: 0.0,
            retry: RetryConfig::default(),
            summarizer: SummarizerConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            system_prompt: system_prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Clamped to at least one round.
    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds.max(1);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retry = RetryConfig::with_retries(retries);
        self
    }

    pub fn with_summarizer(mut self, summarizer: SummarizerConfig) -> Self {
        self.summarizer = summarizer;
        self
    }
}
