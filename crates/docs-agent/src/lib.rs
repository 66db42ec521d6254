//! Tool-using documentation agent.
//!
//! `docs-agent` answers questions about internal documentation by running a
//! language model in a loop with retrieval and ingestion tools backed by a
//! vector store. Conversations, messages and per-user credits live in SQLite.
//!
//! A single user turn flows through these pieces:
//!
//! ```text
//! TurnOrchestrator
//!   ├─ ConversationStore::append_message(user)
//!   ├─ ContextBuilder::build        summary + ordered history
//!   ├─ Harness::run
//!   │    ├─ SummarizationGate::maybe_compress   (once, before the first round)
//!   │    └─ rounds: ChatModel::chat → ToolSet::execute → ...
//!   ├─ ConversationStore::update_summary (when the gate compressed)
//!   ├─ ConversationStore::append_message(assistant)
//!   └─ ConversationStore::deduct_credits(1)
//! ```
//!
//! # Where to find things
//!
//! - **Talk to a model:** the [`ChatModel`] trait and its HTTP implementation
//!   [`ChatClient`] (OpenAI-compatible, Bearer or `api-key` auth).
//! - **Define tools:** [`Tool`](tools::core::Tool), [`ToolSet`](tools::core::ToolSet)
//!   and the built-in retrieval tools in [`tools`].
//! - **Run the loop:** [`Harness`](agent::harness::Harness) with
//!   [`HarnessConfig`](agent::config::HarnessConfig).
//! - **Bound the context:** [`ContextBuilder`](context::builder::ContextBuilder)
//!   and [`SummarizationGate`](context::summarizer::SummarizationGate).
//! - **Handle a whole turn:** [`TurnOrchestrator`](turn::TurnOrchestrator).
//! - **Persistence:** [`store`] (conversations, messages, users, credits) and
//!   [`vector`] (embeddings and document collections).
//!
//! # Example
//!
//! ```ignore
//! use docs_agent::prelude::*;
//! use std::sync::Arc;
//!
//! let model = Arc::new(ChatClient::new(ChatClientConfig::openai(api_key))?);
//! let store = Arc::new(SqliteStore::connect("sqlite://docs.db", StoreOptions::default()).await?);
//! let vectors = Arc::new(QdrantStore::new("http://localhost:6334", None)?);
//! let embedder = Arc::new(OpenAiEmbeddings::new(embeddings_config)?);
//!
//! let tools = Arc::new(ToolSet::new().with_retrieval_tools(vectors, embedder));
//! let orchestrator = TurnOrchestrator::new(store, model, tools, HarnessConfig::default());
//!
//! let outcome = orchestrator.handle_turn(&conversation_id, &user_id, "What is the login endpoint?").await?;
//! println!("{} ({} credits left)", outcome.message.content, outcome.credits_remaining);
//! ```

pub mod agent;
pub mod api;
pub mod context;
pub mod error;
pub mod prelude;
pub mod redact;
pub mod store;
pub mod tools;
pub mod turn;
pub mod vector;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub use error::LlmError;

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

/// Default chat completions endpoint (OpenAI-compatible).
pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default model for all LLM calls.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// HTTP timeout for model calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. This is the bridge between typed tool arguments
/// and the `parameters` object of the function-calling API.
///
/// # Example
///
/// ```
/// use docs_agent::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct SearchArgs {
///     query: String,
///     #[serde(default)]
///     top_k: Option<u32>,
/// }
///
/// let schema = json_schema_for::<SearchArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"query".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Debug, Default, Clone)]
pub struct ChatRequest {
    /// Model name. Azure deployments ignore it; the deployment is in the URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub messages: Vec<Message>,

    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    pub temperature: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "tool" => Ok(MessageRole::Tool),
            other => Err(format!("unknown message role '{other}'")),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// A plain `{role, content}` message, as reconstructed from storage.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    /// Text content, or `""` for tool-call-only messages.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition sent to the API (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CallType {
    #[serde(rename = "function")]
    Function,
}

/// A tool call returned by the model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: CallType::Function,
            function: FunctionCallData {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionCallData {
    pub name: String,
    /// Raw JSON arguments exactly as produced by the model.
    pub arguments: String,
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from [`ChatModel::chat`].
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

impl ChatCompletion {
    /// A text-only completion.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            finish_reason: Some("stop".into()),
            ..Default::default()
        }
    }

    /// A completion requesting tool calls.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            finish_reason: Some("tool_calls".into()),
            ..Default::default()
        }
    }
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Model trait ────────────────────────────────────────────────────

/// Boxed future returned by [`ChatModel::chat`].
pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<ChatCompletion, LlmError>> + Send + 'a>>;

/// Anything that can answer a chat completion request.
///
/// The HTTP client implements this; tests substitute a scripted fake. Uses a
/// boxed future so the trait stays dyn-compatible.
pub trait ChatModel: Send + Sync {
    fn chat<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a>;
}

// ── Client ─────────────────────────────────────────────────────────

/// How the API key is presented to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>` (OpenAI, OpenRouter, most gateways).
    #[default]
    Bearer,
    /// `api-key: <key>` (Azure OpenAI deployments).
    ApiKeyHeader,
}

impl std::str::FromStr for AuthStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bearer" => Ok(AuthStyle::Bearer),
            "api-key" | "azure" => Ok(AuthStyle::ApiKeyHeader),
            other => Err(format!("unknown auth style '{other}' (expected bearer or api-key)")),
        }
    }
}

/// Endpoint configuration for [`ChatClient`].
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    /// Full chat completions URL, including any `api-version` query.
    pub url: String,
    pub api_key: String,
    pub auth_style: AuthStyle,
}

impl ChatClientConfig {
    /// OpenAI's public endpoint with Bearer auth.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            url: OPENAI_CHAT_URL.to_string(),
            api_key: api_key.into(),
            auth_style: AuthStyle::Bearer,
        }
    }

    /// An Azure OpenAI deployment.
    pub fn azure(
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            url: format!(
                "{}/openai/deployments/{deployment}/chat/completions?api-version={api_version}",
                endpoint.trim_end_matches('/')
            ),
            api_key: api_key.into(),
            auth_style: AuthStyle::ApiKeyHeader,
        }
    }
}

/// Apply the configured auth header to a request.
pub(crate) fn with_auth(
    req: reqwest::RequestBuilder,
    style: AuthStyle,
    api_key: &str,
) -> reqwest::RequestBuilder {
    match style {
        AuthStyle::Bearer => req.bearer_auth(api_key),
        AuthStyle::ApiKeyHeader => req.header("api-key", api_key),
    }
}

/// Async HTTP client for an OpenAI-compatible chat completions API.
pub struct ChatClient {
    client: reqwest::Client,
    config: ChatClientConfig,
}

impl ChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("docs-agent/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Send a chat completion request.
    pub async fn send(&self, body: &ChatRequest) -> Result<ChatCompletion, LlmError> {
        let tool_count = body.tools.as_ref().map_or(0, |t| t.len());
        debug!(
            "LLM request: model={}, messages={}, tools={}, max_tokens={}, temp={}",
            body.model.as_deref().unwrap_or("(deployment)"),
            body.messages.len(),
            tool_count,
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = with_auth(
            self.client.post(&self.config.url),
            self.config.auth_style,
            &self.config.api_key,
        )
        .json(body)
        .send()
        .await
        .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| LlmError::Request(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(LlmError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_chat_response(&text)
    }
}

impl ChatModel for ChatClient {
    fn chat<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a> {
        Box::pin(self.send(body))
    }
}

/// Decode a 2xx chat completions body.
fn parse_chat_response(text: &str) -> Result<ChatCompletion, LlmError> {
    let parsed: RawChatResponse =
        serde_json::from_str(text).map_err(|e| LlmError::Decode(e.to_string()))?;

    if let Some(err) = parsed.error {
        return Err(LlmError::Api(err.message));
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    let completion = match parsed.choices.and_then(|c| c.into_iter().next()) {
        Some(c) => ChatCompletion {
            content: c.message.content,
            tool_calls: c.message.tool_calls.unwrap_or_default(),
            usage: parsed.usage,
            finish_reason: c.finish_reason,
        },
        None => {
            debug!("LLM output: empty (no choices)");
            ChatCompletion {
                usage: parsed.usage,
                ..Default::default()
            }
        }
    };
    Ok(completion)
}
