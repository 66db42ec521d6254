//! Convenience re-exports for common `docs-agent` types.
//!
//! ```ignore
//! use docs_agent::prelude::*;
//! ```
//!
//! Covers wiring a turn pipeline: the model client, store, vector backends,
//! tool set, harness and orchestrator. Test doubles stay in
//! [`testing`](crate::testing).

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    AuthStyle, ChatClient, ChatClientConfig, ChatCompletion, ChatModel, ChatRequest, Message,
    MessageRole, ToolCall, ToolDef, json_schema_for,
};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    EventHandler, Harness, HarnessConfig, HarnessEvent, HarnessResult, LoggingHandler, NoopHandler,
};
pub use crate::context::{AgentContext, ContextBuilder, SummarizationGate, SummarizerConfig};
pub use crate::turn::{TurnError, TurnOrchestrator, TurnOutcome};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{Tool, ToolFuture, ToolName, ToolSet, parse_tool_args};

// ── Persistence ─────────────────────────────────────────────────────
pub use crate::store::{ConversationStore, CreditDeduction, SqliteStore, StoreOptions};
pub use crate::vector::{
    Embedder, EmbeddingsConfig, InMemoryVectorStore, OpenAiEmbeddings, QdrantStore, VectorStore,
};

// ── Errors ──────────────────────────────────────────────────────────
pub use crate::error::{AgentError, LlmError, StoreError, VectorError};
