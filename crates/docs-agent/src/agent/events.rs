//! Events, handlers, and run results for the [`Harness`](super::harness::Harness).
//!
//! The harness reports progress through [`HarnessEvent`] variants. Callers
//! implement [`EventHandler`] to observe them.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |

use crate::Message;
use crate::redact::{preview, redact_json};
use tracing::{debug, info, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the harness during a run.
#[derive(Debug)]
pub enum HarnessEvent<'a> {
    /// The working history was compressed before the first round.
    Compressed {
        before: usize,
        after: usize,
        summary: &'a str,
    },
    /// A new round is starting.
    RoundStart {
        round: u32,
        max_rounds: u32,
        messages: usize,
    },
    /// The model returned text (possibly alongside tool calls).
    Text(&'a str),
    /// The model requested tool calls this round.
    ToolCallsReceived { round: u32, count: usize },
    /// A tool is about to run.
    ToolExecuting { name: &'a str, arguments: &'a str },
    /// A tool finished.
    ToolResult {
        name: &'a str,
        call_id: &'a str,
        result: &'a str,
    },
    /// Token usage reported for this round.
    TokenUsage {
        prompt_tokens: u32,
        completion_tokens: u32,
    },
    /// The model answered without tool calls.
    Finished,
    /// The loop hit the round cap.
    RoundLimitReached { max_rounds: u32 },
}

/// Observer for harness events.
///
/// ```ignore
/// struct CountTools(AtomicUsize);
///
/// impl EventHandler for CountTools {
///     fn on_event(&self, event: &HarnessEvent<'_>) {
///         if let HarnessEvent::ToolResult { .. } = event {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &HarnessEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// Logs events via `tracing`. Model text and tool payloads only appear as
/// short previews.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &HarnessEvent<'_>) {
        match event {
            HarnessEvent::Compressed { before, after, .. } => {
                info!("History compressed: {before} -> {after} messages");
            }
            HarnessEvent::RoundStart {
                round,
                max_rounds,
                messages,
            } => {
                debug!("[round {round}/{max_rounds}] {messages} messages in context");
            }
            HarnessEvent::Text(text) => {
                debug!("Model text: {}", preview(text));
            }
            HarnessEvent::ToolCallsReceived { round, count } => {
                debug!("{count} tool call(s) in round {round}");
            }
            HarnessEvent::ToolExecuting { name, arguments } => {
                let args = match serde_json::from_str::<serde_json::Value>(arguments) {
                    Ok(mut value) => {
                        redact_json(&mut value);
                        preview(&value.to_string())
                    }
                    Err(_) => preview(arguments),
                };
                debug!(args = %args, "Executing tool: {name}");
            }
            HarnessEvent::ToolResult { name, result, .. } => {
                debug!("Tool {name} result: {} bytes", result.len());
            }
            HarnessEvent::TokenUsage {
                prompt_tokens,
                completion_tokens,
            } => {
                debug!("Tokens: prompt={prompt_tokens}, completion={completion_tokens}");
            }
            HarnessEvent::Finished => {
                debug!("Agent finished (no more tool calls)");
            }
            HarnessEvent::RoundLimitReached { max_rounds } => {
                warn!("Agent hit round limit ({max_rounds})");
            }
        }
    }
}

// ── Run result ─────────────────────────────────────────────────────

/// The result of [`Harness::run`](super::harness::Harness::run).
#[derive(Debug, Clone)]
pub struct HarnessResult {
    /// Final assistant text, or the fallback when the model produced none.
    pub text: String,
    /// New rolling summary, when the gate compressed the history.
    pub summary: Option<String>,
    /// The working list at the end of the run, without the system prompt.
    pub messages: Vec<Message>,
    pub rounds_used: u32,
    /// `false` when the round cap ended the run.
    pub finished: bool,
    pub total_prompt_tokens: u32,
    pub total_completion_tokens: u32,
}

impl HarnessResult {
    pub fn total_tokens(&self) -> u32 {
        self.total_prompt_tokens + self.total_completion_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountTools(AtomicUsize);

    impl EventHandler for CountTools {
        fn on_event(&self, event: &HarnessEvent<'_>) {
            if matches!(event, HarnessEvent::ToolExecuting { .. }) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn custom_handler_sees_only_what_it_matches() {
        let handler = CountTools::default();
        handler.on_event(&HarnessEvent::Finished);
        handler.on_event(&HarnessEvent::ToolExecuting {
            name: "semantic_search",
            arguments: "{}",
        });
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);

        // Default implementations accept every variant.
        NoopHandler.on_event(&HarnessEvent::Text("hello"));
        LoggingHandler.on_event(&HarnessEvent::RoundLimitReached { max_rounds: 10 });
    }
}
