//! `pdf_to_chunks`: extract PDF text and split it into token-bounded chunks.
//!
//! Chunking is greedy over whitespace-separated words. Each word is counted
//! with the cl100k_base tokenizer on its own and words are added to the
//! current chunk until the next one would push it over the budget. A word
//! that alone exceeds the budget becomes a chunk of its own; chunks are
//! never empty.

use super::core::{Tool, ToolFuture, parse_tool_args};
use super::names::ToolName;
use crate::{ToolDef, json_schema_for};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

/// Pages read when `max_pages` is not given.
pub const DEFAULT_MAX_PAGES: usize = 15;

/// Chunk budget when `max_tokens_per_chunk` is not given.
pub const DEFAULT_MAX_TOKENS_PER_CHUNK: usize = 650;

/// Typed arguments for `pdf_to_chunks`.
#[derive(Deserialize, JsonSchema)]
pub struct PdfToChunksArgs {
    /// Path to the PDF file on the server.
    pub file_path: String,
    /// Number of leading pages to read (default 15).
    #[serde(default)]
    pub max_pages: Option<usize>,
    /// Token budget per chunk (default 650).
    #[serde(default)]
    pub max_tokens_per_chunk: Option<usize>,
}

// ── Token counting ──────────────────────────────────────────────────

/// Cached cl100k_base encoder. `None` if it failed to load.
static CL100K_BASE: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn cl100k_base() -> Option<&'static CoreBPE> {
    CL100K_BASE
        .get_or_init(|| match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                warn!("cl100k_base unavailable, estimating tokens from length: {e}");
                None
            }
        })
        .as_ref()
}

/// Token count of `text` under cl100k_base.
///
/// Falls back to one token per four characters (rounded up, at least one
/// for non-empty input) when the encoder is unavailable.
pub fn count_tokens(text: &str) -> usize {
    match cl100k_base() {
        Some(bpe) => bpe.encode_ordinary(text).len(),
        None => estimate_tokens(text),
    }
}

fn estimate_tokens(text: &str) -> usize {
    match text.chars().count() {
        0 => 0,
        n => n.div_ceil(4),
    }
}

// ── Chunking ────────────────────────────────────────────────────────

/// Split `text` on whitespace and pack words greedily into chunks of at most
/// `max_tokens` tokens as measured by `count`.
///
/// Words inside a chunk are joined with a single space.
pub fn chunk_words(text: &str, max_tokens: usize, count: impl Fn(&str) -> usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut used = 0usize;

    for word in text.split_whitespace() {
        let n = count(word);
        if !current.is_empty() && used + n > max_tokens {
            chunks.push(current.join(" "));
            current.clear();
            used = 0;
        }
        current.push(word);
        used += n;
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

/// Extract the text of the first `max_pages` pages, joined by newlines.
fn extract_pages(bytes: &[u8], max_pages: usize) -> Result<String, String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| e.to_string())?;
    Ok(pages
        .into_iter()
        .take(max_pages)
        .collect::<Vec<_>>()
        .join("\n"))
}

// ── Tool ────────────────────────────────────────────────────────────

/// Read a PDF from disk and return its text as a JSON array of chunks.
///
/// With [`with_root`](Self::with_root), paths are resolved against the root
/// and anything that escapes it is refused.
#[derive(Debug, Default)]
pub struct PdfToChunks {
    root: Option<PathBuf>,
}

impl PdfToChunks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    async fn resolve(&self, file_path: &str) -> Result<PathBuf, String> {
        let Some(root) = &self.root else {
            return Ok(PathBuf::from(file_path));
        };
        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(|e| format!("document root unavailable: {e}"))?;
        let candidate = tokio::fs::canonicalize(root.join(file_path))
            .await
            .map_err(|e| format!("cannot open '{file_path}': {e}"))?;
        if candidate.starts_with(&root) {
            Ok(candidate)
        } else {
            Err(format!("'{file_path}' is outside the document root"))
        }
    }

    async fn run(&self, args: PdfToChunksArgs) -> Result<Vec<String>, String> {
        let max_pages = args.max_pages.unwrap_or(DEFAULT_MAX_PAGES).max(1);
        let max_tokens = args
            .max_tokens_per_chunk
            .unwrap_or(DEFAULT_MAX_TOKENS_PER_CHUNK)
            .max(1);

        let path = self.resolve(&args.file_path).await?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| format!("cannot read '{}': {e}", path.display()))?;

        let text = tokio::task::spawn_blocking(move || extract_pages(&bytes, max_pages))
            .await
            .map_err(|e| format!("PDF extraction aborted: {e}"))?
            .map_err(|e| format!("failed to extract text: {e}"))?;

        let chunks = chunk_words(&text, max_tokens, count_tokens);
        debug!(
            path = %path.display(),
            chunks = chunks.len(),
            max_tokens,
            "Chunked PDF"
        );
        Ok(chunks)
    }
}

impl Tool for PdfToChunks {
    fn name(&self) -> ToolName {
        ToolName::PdfToChunks
    }

    fn definition(&self) -> ToolDef {
        ToolDef::new(
            self.name().as_str(),
            "Extract text from a PDF file and split it into chunks of at most \
             max_tokens_per_chunk tokens, suitable for add_documents. \
             Returns a JSON array of strings in document order.",
            json_schema_for::<PdfToChunksArgs>(),
        )
    }

    // The chunk array feeds `add_documents`; a cut would drop chunks and break the JSON.
    fn truncate_output(&self) -> bool {
        false
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<PdfToChunksArgs>(arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return json!({ "error": e }).to_string(),
            };
            match self.run(args).await {
                Ok(chunks) => serde_json::to_string(&chunks).unwrap_or_else(|_| "[]".into()),
                Err(e) => json!({ "error": e }).to_string(),
            }
        })
    }
}
