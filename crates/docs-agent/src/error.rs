//! Error types for the agent core.
//!
//! Tool failures are not here: tools report problems as result strings so the
//! model can react to them. These enums cover the failures that abort work.

use thiserror::Error;

/// Failure talking to the chat-completion or embeddings endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    /// Transport-level failure (connect, timeout, body read).
    #[error("request failed: {0}")]
    Request(String),
    /// Non-2xx response.
    #[error("model API HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// An `error` object in an otherwise successful response.
    #[error("model API error: {0}")]
    Api(String),
    /// The response body did not match the expected shape.
    #[error("failed to parse response: {0}")]
    Decode(String),
}

impl LlmError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Request(_) => true,
            LlmError::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            LlmError::Client(_) | LlmError::Api(_) | LlmError::Decode(_) => false,
        }
    }
}

/// Failure in the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Failure in the vector store or the embedding backend.
#[derive(Debug, Error)]
pub enum VectorError {
    #[error("invalid collection name '{0}': use 1-255 letters, digits, '_' or '-'")]
    InvalidCollectionName(String),
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),
    #[error("collection '{0}' already exists")]
    CollectionExists(String),
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("vector store request failed: {0}")]
    Backend(String),
    #[error("embedding failed: {0}")]
    Embedding(#[from] LlmError),
}

/// Failure that aborts an agent run.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The summary call before the first round failed.
    #[error("summarization failed: {0}")]
    Summarization(#[source] LlmError),
    /// A model call in the reasoning loop failed.
    #[error("model call failed in round {round}: {source}")]
    Model {
        round: u32,
        #[source]
        source: LlmError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LlmError::Request("timed out".into()).is_transient());
        assert!(LlmError::Http { status: 503, body: String::new() }.is_transient());
        assert!(!LlmError::Http { status: 401, body: String::new() }.is_transient());
        assert!(!LlmError::Decode("eof".into()).is_transient());
    }

    #[test]
    fn display_includes_status() {
        let err = LlmError::Http {
            status: 429,
            body: "slow down".into(),
        };
        assert_eq!(err.to_string(), "model API HTTP 429: slow down");
    }
}
