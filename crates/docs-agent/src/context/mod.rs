//! Bounded conversation context.
//!
//! 1. **[`builder`]**: [`ContextBuilder`] turns a stored conversation into the
//!    message list for one turn: an optional `system` summary message followed
//!    by every persisted message in creation order. It never truncates.
//!
//! 2. **[`summarizer`]**: [`SummarizationGate`] runs once before the first model
//!    round. Past a fixed message count it replaces the list with a fresh
//!    summary plus the most recent messages, and hands the summary back so the
//!    caller can persist it.

pub mod builder;
pub mod summarizer;

pub use builder::{AgentContext, ContextBuilder, SUMMARY_PREFIX, summary_message};
pub use summarizer::{Compression, SUMMARY_PROMPT, SummarizationGate, SummarizerConfig};
