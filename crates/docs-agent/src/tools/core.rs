//! Tool abstraction for function-calling agents.
//!
//! The [`Tool`] trait defines the interface every tool implements: a static
//! API definition (name, description, JSON schema) and an async `execute`
//! method. Tools are collected into a [`ToolSet`] which handles dispatch,
//! definition export, and result truncation.

use super::names::ToolName;
use super::pdf::PdfToChunks;
use super::retrieval::{AddDocuments, CreateCollection, ListCollections, SemanticSearch};
use crate::ToolDef;
use crate::vector::{Embedder, VectorStore};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Maximum size (in bytes) for tool output before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Default timeout for tool execution.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Boxed future returned by [`Tool::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = String> + Send + 'a>>;

// ── Tool trait ─────────────────────────────────────────────────────

/// A tool that the model can invoke via function-calling.
///
/// # Example
///
/// ```ignore
/// struct ListCollections { store: Arc<dyn VectorStore> }
///
/// impl Tool for ListCollections {
///     fn name(&self) -> ToolName { ToolName::ListCollections }
///
///     fn definition(&self) -> ToolDef { /* ... */ }
///
///     fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
///         Box::pin(async move {
///             let names = self.store.list_collections().await.unwrap_or_default();
///             serde_json::to_string(&names).unwrap_or_else(|_| "[]".into())
///         })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// Registry key. Must match `definition().function.name`.
    fn name(&self) -> ToolName;

    /// The tool definition sent to the model.
    fn definition(&self) -> ToolDef;

    /// Execute the tool with the raw JSON arguments string.
    ///
    /// Errors are returned as result strings (`"Error: ..."` or
    /// `{"error": ...}`), never as panics; the loop hands whatever comes back
    /// to the model as the tool result.
    fn execute(&self, arguments: &str) -> ToolFuture<'_>;

    /// Whether [`ToolSet`] may cut this tool's output at its byte limit.
    /// Tools whose result must stay well-formed JSON return `false`.
    fn truncate_output(&self) -> bool {
        true
    }
}

// ── ToolSet ────────────────────────────────────────────────────────

/// A collection of tools dispatched by name.
///
/// ```ignore
/// let tools = ToolSet::new()
///     .with_retrieval_tools(vector_store, embedder)
///     .with_default_timeout(Some(Duration::from_secs(30)));
///
/// let defs = tools.definitions();
/// let result = tools.execute("list_collections", "{}").await;
/// ```
pub struct ToolSet {
    tools: BTreeMap<ToolName, Box<dyn Tool>>,
    max_result_bytes: usize,
    /// Validate arguments against the declared JSON Schema before execution.
    validate_args: bool,
    /// `None` disables timeouts.
    default_timeout: Option<Duration>,
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("max_result_bytes", &self.max_result_bytes)
            .finish()
    }
}

impl ToolSet {
    /// An empty tool set with validation on and the default timeout.
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            validate_args: true,
            default_timeout: Some(DEFAULT_TOOL_TIMEOUT),
        }
    }

    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Register all five documentation tools over the given backends.
    ///
    /// `pdf_to_chunks` reads any path the process can read; use
    /// [`with`](Self::with) and [`PdfToChunks::with_root`] to confine it.
    pub fn with_retrieval_tools(
        self,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        self.with(SemanticSearch::new(store.clone(), embedder.clone()))
            .with(AddDocuments::new(store.clone(), embedder.clone()))
            .with(CreateCollection::new(store.clone(), embedder))
            .with(ListCollections::new(store))
            .with(PdfToChunks::new())
    }

    /// All tool definitions, in [`ToolName`] order.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn contains(&self, name: ToolName) -> bool {
        self.tools.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call by name, with validation, timing and truncation.
    /// Tools that opt out via [`Tool::truncate_output`] are returned whole.
    ///
    /// Unknown names, invalid arguments and timeouts all come back as
    /// `"Error: ..."` strings so the model can correct itself.
    pub async fn execute(&self, name: &str, arguments: &str) -> String {
        let tool = match name.parse::<ToolName>().ok().and_then(|n| self.tools.get(&n)) {
            Some(t) => t,
            None => return format!("Error: unknown tool '{name}'"),
        };

        // Models sometimes send an empty string for argument-less calls.
        let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };

        if self.validate_args
            && let Some(error) = validate_tool_arguments(tool.as_ref(), arguments)
        {
            return error;
        }

        log_tool_call(name, arguments);
        let start = std::time::Instant::now();

        let result = if let Some(limit) = self.default_timeout {
            match tokio::time::timeout(limit, tool.execute(arguments)).await {
                Ok(r) => r,
                Err(_) => {
                    info!(
                        "Tool {name} timed out after {:.1}s (limit: {:.0}s)",
                        start.elapsed().as_secs_f64(),
                        limit.as_secs_f64(),
                    );
                    format!(
                        "Error: tool '{name}' timed out after {:.0} seconds.",
                        limit.as_secs_f64(),
                    )
                }
            }
        } else {
            tool.execute(arguments).await
        };

        debug!(
            "Tool {name} completed in {:.0}ms ({} bytes)",
            start.elapsed().as_secs_f64() * 1000.0,
            result.len()
        );
        trace!(
            "Tool {name} result preview: {}",
            crate::redact::preview(&result)
        );

        if tool.truncate_output() {
            truncate_result(result, self.max_result_bytes)
        } else {
            result
        }
    }
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate tool arguments against the tool's declared JSON Schema.
///
/// Returns `None` if valid, or `Some(error_string)` formatted for the model.
pub fn validate_tool_arguments(tool: &dyn Tool, arguments: &str) -> Option<String> {
    let name = tool.name();
    let args_value: serde_json::Value = match serde_json::from_str(arguments) {
        Ok(v) => v,
        Err(e) => {
            return Some(format!(
                "Error: invalid JSON arguments for tool '{name}': {e}. \
                 Please provide valid JSON matching the tool's parameter schema."
            ));
        }
    };

    let schema = tool.definition().function.parameters;
    // An invalid schema is a programming error; skip validation rather than
    // blocking every call.
    let Ok(validator) = jsonschema::validator_for(&schema) else {
        return None;
    };

    let errors: Vec<String> = validator
        .iter_errors(&args_value)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Error: argument validation failed for tool '{name}':\n{}\n\
             Please fix the arguments and try again.",
            errors.join("\n")
        ))
    }
}

/// Log a tool call with a short argument preview. Arguments can carry user
/// documents, so the full text only goes to `trace`.
fn log_tool_call(name: &str, arguments: &str) {
    info!("[tool] {name}({})", crate::redact::preview(arguments));
    trace!("[tool] {name} arguments: {arguments}");
}

/// Truncate a string to at most `max` bytes (on a char boundary), appending
/// a notice if trimmed.
pub fn truncate_result(mut s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let total = s.len();
    s.truncate(s.floor_char_boundary(max));
    format!("{s}...\n[truncated: {total} bytes total]")
}

/// Parse raw JSON arguments into a typed struct.
///
/// The error string is suitable for returning directly from
/// [`Tool::execute`].
pub fn parse_tool_args<T: serde::de::DeserializeOwned>(arguments: &str) -> Result<T, String> {
    serde_json::from_str(arguments).map_err(|e| {
        format!(
            "Error: invalid tool arguments: {e}. \
             Please provide valid JSON matching the tool's parameter schema."
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Claims the `list_collections` slot and echoes its `text` argument.
    struct EchoTool;

    impl Tool for EchoTool {
        fn name(&self) -> ToolName {
            ToolName::ListCollections
        }

        fn definition(&self) -> ToolDef {
            ToolDef::new(
                self.name().as_str(),
                "Echo the input",
                serde_json::json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                }),
            )
        }

        fn execute(&self, arguments: &str) -> ToolFuture<'_> {
            let args: serde_json::Value = serde_json::from_str(arguments).unwrap_or_default();
            let result = args["text"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| "Error: no text".into());
            Box::pin(async move { result })
        }
    }

    struct SlowTool(Arc<AtomicUsize>);

    impl Tool for SlowTool {
        fn name(&self) -> ToolName {
            ToolName::PdfToChunks
        }

        fn definition(&self) -> ToolDef {
            ToolDef::new(
                self.name().as_str(),
                "Sleeps",
                serde_json::json!({"type": "object", "properties": {}}),
            )
        }

        fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "done".to_string()
            })
        }
    }

    /// Returns a JSON array and asks to be exempt from truncation.
    struct ArrayTool;

    impl Tool for ArrayTool {
        fn name(&self) -> ToolName {
            ToolName::SemanticSearch
        }

        fn definition(&self) -> ToolDef {
            ToolDef::new(
                self.name().as_str(),
                "Ten chunks",
                serde_json::json!({"type": "object", "properties": {}}),
            )
        }

        fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
            let chunks: Vec<String> = (0..10).map(|i| format!("chunk number {i}")).collect();
            Box::pin(async move { serde_json::to_string(&chunks).unwrap() })
        }

        fn truncate_output(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn execute_known_tool() {
        let set = ToolSet::new().with(EchoTool);
        let result = set.execute("list_collections", r#"{"text": "hello"}"#).await;
        assert_eq!(result, "hello");
    }

    #[tokio::test]
    async fn unknown_and_unregistered_names() {
        let set = ToolSet::new().with(EchoTool);
        assert_eq!(
            set.execute("rm_rf", "{}").await,
            "Error: unknown tool 'rm_rf'"
        );
        assert!(set.execute("semantic_search", "{}").await.contains("unknown tool"));
    }

    #[tokio::test]
    async fn validation_rejects_missing_fields() {
        let set = ToolSet::new().with(EchoTool);
        let result = set.execute("list_collections", "{}").await;
        assert!(result.starts_with("Error: argument validation failed"), "{result}");

        let result = set.execute("list_collections", "not json").await;
        assert!(result.starts_with("Error: invalid JSON arguments"), "{result}");
    }

    #[tokio::test]
    async fn empty_arguments_are_treated_as_empty_object() {
        let calls = Arc::new(AtomicUsize::new(0));
        let set = ToolSet::new()
            .with_default_timeout(Some(Duration::from_millis(10)))
            .with(SlowTool(calls.clone()));
        let result = set.execute("pdf_to_chunks", "").await;
        assert!(result.contains("timed out"), "{result}");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn truncates_long_results() {
        let set = ToolSet::new().with_max_result_bytes(5).with(EchoTool);
        let result = set
            .execute("list_collections", r#"{"text": "abcdefghij"}"#)
            .await;
        assert!(result.starts_with("abcde..."));
        assert!(result.contains("[truncated: 10 bytes total]"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "ééé".to_string(); // 6 bytes
        let out = truncate_result(s, 3);
        assert!(out.starts_with("é..."));
        assert_eq!(truncate_result("short".into(), 10), "short");
    }

    #[test]
    fn definitions_are_ordered_and_deduplicated() {
        let set = ToolSet::new()
            .with(SlowTool(Arc::new(AtomicUsize::new(0))))
            .with(EchoTool)
            .with(EchoTool);
        assert_eq!(set.len(), 2);
        let names: Vec<String> = set
            .definitions()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(names, vec!["list_collections", "pdf_to_chunks"]);
    }

    #[tokio::test]
    async fn tools_exempt_from_truncation_are_returned_whole() {
        let set = ToolSet::new()
            .with_max_result_bytes(20)
            .with(ArrayTool)
            .with(EchoTool);

        let result = set.execute("semantic_search", "{}").await;
        let chunks: Vec<String> = serde_json::from_str(&result).unwrap();
        assert_eq!(chunks.len(), 10);
        assert_eq!(chunks[9], "chunk number 9");

        let echoed = set
            .execute("list_collections", r#"{"text": "abcdefghijklmnopqrstuvwxyz"}"#)
            .await;
        assert!(echoed.contains("[truncated: 26 bytes total]"), "{echoed}");
    }
}
