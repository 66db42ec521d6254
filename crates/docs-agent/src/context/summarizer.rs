//! Rolling-summary compression of long conversations.
//!
//! Once the working list grows past [`SummarizerConfig::threshold`] messages,
//! the content of the last `window` messages is summarised in a single model
//! call and the list is rewritten as `[system(summary), last keep_recent..]`.
//! The compression is lossy and one-way; below the threshold the list passes
//! through untouched and no summary is produced.
//!
//! A failed summary call fails the turn. There is no fallback to the
//! uncompressed list.

use super::builder::summary_message;
use crate::{ChatModel, ChatRequest, LlmError, Message};
use tracing::{debug, info};

/// Instruction sent to the model; `{chat_history}` is replaced by the
/// newline-joined message contents.
pub const SUMMARY_PROMPT: &str = "Conversation summary:\n{chat_history}\n\nSummary:";

/// Tuning for [`SummarizationGate`].
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Compress when the list holds strictly more messages than this.
    pub threshold: usize,
    /// How many trailing messages feed the summary.
    pub window: usize,
    /// How many trailing messages survive verbatim after compression.
    pub keep_recent: usize,
    /// Model for the summary call. `None` uses the main model.
    pub model: Option<String>,
    /// Response cap for the summary call. 0 leaves it to the provider.
    pub max_summary_tokens: u32,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            window: 10,
            keep_recent: 5,
            model: None,
            max_summary_tokens: 1024,
        }
    }
}

/// Result of [`SummarizationGate::maybe_compress`].
#[derive(Debug, Clone, PartialEq)]
pub struct Compression {
    pub messages: Vec<Message>,
    /// The new summary, present only when the list was rewritten.
    pub summary: Option<String>,
}

/// Decides when to compress and performs the rewrite.
#[derive(Debug, Clone, Default)]
pub struct SummarizationGate {
    config: SummarizerConfig,
}

impl SummarizationGate {
    pub fn new(config: SummarizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Whether a list of `len` messages would be compressed.
    pub fn should_compress(&self, len: usize) -> bool {
        len > self.config.threshold
    }

    /// The summary request for the tail of `messages`.
    pub fn build_request(&self, messages: &[Message], main_model: Option<&str>) -> ChatRequest {
        let start = messages.len().saturating_sub(self.config.window);
        let chat_history = messages[start..]
            .iter()
            .map(Message::text)
            .collect::<Vec<_>>()
            .join("\n");

        ChatRequest {
            model: self.config.model.as_deref().or(main_model).map(str::to_string),
            messages: vec![Message::user(
                SUMMARY_PROMPT.replace("{chat_history}", &chat_history),
            )],
            max_tokens: self.config.max_summary_tokens,
            temperature: 0.0,
            tools: None,
        }
    }

    /// Compress `messages` if they exceed the threshold.
    ///
    /// `main_model` is the model name used when the config names none.
    pub async fn maybe_compress(
        &self,
        model: &dyn ChatModel,
        main_model: Option<&str>,
        messages: Vec<Message>,
    ) -> Result<Compression, LlmError> {
        if !self.should_compress(messages.len()) {
            return Ok(Compression {
                messages,
                summary: None,
            });
        }

        let request = self.build_request(&messages, main_model);
        let completion = model.chat(&request).await?;
        let summary = completion
            .content
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LlmError::Decode("summary response was empty".into()))?;

        let before = messages.len();
        let keep_from = before.saturating_sub(self.config.keep_recent);
        let mut rewritten = Vec::with_capacity(self.config.keep_recent + 1);
        rewritten.push(summary_message(&summary));
        rewritten.extend(messages.into_iter().skip(keep_from));

        info!(
            before,
            after = rewritten.len(),
            summary_chars = summary.len(),
            "Compressed conversation history"
        );
        debug!("New summary: {}", crate::redact::preview(&summary));

        Ok(Compression {
            messages: rewritten,
            summary: Some(summary),
        })
    }
}
