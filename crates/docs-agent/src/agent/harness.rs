//! Agent harness: the reason/act loop over a [`ChatModel`] and a [`ToolSet`].
//!
//! The [`Harness`] first passes the working history through the
//! [`SummarizationGate`] once, then alternates between asking the model for
//! the next step and executing the tool calls it requests, appending every
//! result as a `tool` message. It stops when the model answers without tool
//! calls or when `max_rounds` is reached.
//!
//! Model errors are not retried unless [`HarnessConfig::retry`] says so; they
//! end the run with an [`AgentError`].

use super::config::{FALLBACK_RESPONSE, HarnessConfig};
use super::events::{EventHandler, HarnessEvent, HarnessResult, NoopHandler};
use crate::api::retry::retry_api_call;
use crate::context::summarizer::SummarizationGate;
use crate::error::AgentError;
use crate::tools::core::ToolSet;
use crate::{ChatCompletion, ChatModel, ChatRequest, Message, ToolDef};
use tracing::{debug, warn};

// ── Harness ────────────────────────────────────────────────────────

/// The agentic tool-use loop.
///
/// ```ignore
/// let tools = ToolSet::new().with_retrieval_tools(vectors, embedder);
/// let handler = LoggingHandler;
///
/// let result = Harness::new(&model, &tools, HarnessConfig::default())
///     .with_event_handler(&handler)
///     .run(context.into_messages())
///     .await?;
///
/// println!("{}", result.text);
/// ```
///
/// `Harness<'a>` borrows the model, tools and handler; bind them before
/// building the harness so they outlive `.run()`.
pub struct Harness<'a> {
    model: &'a dyn ChatModel,
    tools: &'a ToolSet,
    config: HarnessConfig,
    event_handler: &'a dyn EventHandler,
}

impl<'a> Harness<'a> {
    pub fn new(model: &'a dyn ChatModel, tools: &'a ToolSet, config: HarnessConfig) -> Self {
        Self {
            model,
            tools,
            config,
            event_handler: &NoopHandler,
        }
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    /// Run one turn over `messages` (summary + history, no system prompt).
    pub async fn run(self, messages: Vec<Message>) -> Result<HarnessResult, AgentError> {
        let gate = SummarizationGate::new(self.config.summarizer.clone());
        let before = messages.len();
        let compression = gate
            .maybe_compress(self.model, self.config.model.as_deref(), messages)
            .await
            .map_err(AgentError::Summarization)?;
        let mut messages = compression.messages;
        if let Some(summary) = &compression.summary {
            self.event_handler.on_event(&HarnessEvent::Compressed {
                before,
                after: messages.len(),
                summary,
            });
        }

        let tool_defs = self.tools.definitions();
        let mut acc = RunAccumulator::default();

        for round in 1..=self.config.max_rounds {
            acc.rounds_used = round;
            self.event_handler.on_event(&HarnessEvent::RoundStart {
                round,
                max_rounds: self.config.max_rounds,
                messages: messages.len(),
            });

            let body = self.build_request(&messages, &tool_defs);
            let completion = retry_api_call(&self.config.retry, || self.model.chat(&body))
                .await
                .map_err(|source| AgentError::Model { round, source })?;

            acc.record_usage(&completion, self.event_handler);
            let ChatCompletion {
                content,
                tool_calls,
                ..
            } = completion;
            let text = content.filter(|c| !c.trim().is_empty());
            if let Some(text) = &text {
                self.event_handler.on_event(&HarnessEvent::Text(text));
                acc.last_text = Some(text.clone());
            }

            if tool_calls.is_empty() {
                let answer = text.unwrap_or_else(|| FALLBACK_RESPONSE.to_string());
                messages.push(Message::assistant_text(answer.as_str()));
                acc.answer = Some(answer);
                acc.finished = true;
                self.event_handler.on_event(&HarnessEvent::Finished);
                break;
            }

            // ── Execute tool calls, in the order requested ──
            self.event_handler.on_event(&HarnessEvent::ToolCallsReceived {
                round,
                count: tool_calls.len(),
            });
            let mut assistant = Message::assistant_tool_calls(tool_calls.clone());
            assistant.content = text;
            messages.push(assistant);

            for call in &tool_calls {
                self.event_handler.on_event(&HarnessEvent::ToolExecuting {
                    name: &call.function.name,
                    arguments: &call.function.arguments,
                });
                let result = self
                    .tools
                    .execute(&call.function.name, &call.function.arguments)
                    .await;
                self.event_handler.on_event(&HarnessEvent::ToolResult {
                    name: &call.function.name,
                    call_id: &call.id,
                    result: &result,
                });
                messages.push(Message::tool_result(&call.id, result));
            }
        }

        if !acc.finished {
            warn!(
                max_rounds = self.config.max_rounds,
                "Round limit reached before a final answer"
            );
            self.event_handler.on_event(&HarnessEvent::RoundLimitReached {
                max_rounds: self.config.max_rounds,
            });
        }

        // At the cap, the most recent text seen stands in for an answer.
        let text = acc
            .answer
            .take()
            .or_else(|| acc.last_text.take())
            .unwrap_or_else(|| FALLBACK_RESPONSE.to_string());

        debug!(
            rounds = acc.rounds_used,
            finished = acc.finished,
            "Agent run complete"
        );

        Ok(HarnessResult {
            text,
            summary: compression.summary,
            messages,
            rounds_used: acc.rounds_used,
            finished: acc.finished,
            total_prompt_tokens: acc.prompt_tokens,
            total_completion_tokens: acc.completion_tokens,
        })
    }

    fn build_request(&self, messages: &[Message], tool_defs: &[ToolDef]) -> ChatRequest {
        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(Message::system(&self.config.system_prompt));
        all.extend_from_slice(messages);
        ChatRequest {
            model: self.config.model.clone(),
            messages: all,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            tools: (!tool_defs.is_empty()).then(|| tool_defs.to_vec()),
        }
    }
}

/// Values accumulated across rounds.
#[derive(Default)]
struct RunAccumulator {
    /// Text of the terminal round.
    answer: Option<String>,
    /// Most recent non-empty text from any round.
    last_text: Option<String>,
    prompt_tokens: u32,
    completion_tokens: u32,
    rounds_used: u32,
    finished: bool,
}

impl RunAccumulator {
    fn record_usage(&mut self, completion: &ChatCompletion, handler: &dyn EventHandler) {
        if let Some(usage) = &completion.usage {
            let prompt_tokens = usage.prompt_tokens.unwrap_or(0);
            let completion_tokens = usage.completion_tokens.unwrap_or(0);
            self.prompt_tokens += prompt_tokens;
            self.completion_tokens += completion_tokens;
            handler.on_event(&HarnessEvent::TokenUsage {
                prompt_tokens,
                completion_tokens,
            });
        }
    }
}
