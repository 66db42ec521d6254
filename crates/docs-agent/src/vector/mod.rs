//! Embeddings and document collections.
//!
//! The retrieval tools only see the two traits defined here:
//!
//! - [`Embedder`] turns text into vectors ([`OpenAiEmbeddings`] over HTTP).
//! - [`VectorStore`] keeps named collections of `{id, vector, text}` points
//!   ([`QdrantStore`] for deployments, [`InMemoryVectorStore`] for tests and
//!   local runs).
//!
//! Both are shared across concurrent turns behind `Arc` without locking.

pub mod embeddings;
pub mod memory;
pub mod qdrant;

pub use embeddings::{EmbeddingsConfig, OpenAiEmbeddings};
pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantStore;

use crate::LlmError;
use crate::error::VectorError;
use async_trait::async_trait;
use uuid::Uuid;

/// Maximum collection name length.
pub const MAX_COLLECTION_NAME_LEN: usize = 255;

/// Payload key holding the document text.
pub const TEXT_PAYLOAD_KEY: &str = "text";

/// Turns text into embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of documents, one vector per input in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Embed a single search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| LlmError::Decode("embedding response contained no vectors".into()))
    }

    /// Vector length produced by this embedder.
    fn dimensions(&self) -> usize;
}

/// A document ready to be written to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub text: String,
}

impl DocumentPoint {
    /// A point with a fresh random id.
    pub fn new(vector: Vec<f32>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            vector,
            text: text.into(),
        }
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    /// `None` when the stored payload has no text.
    pub text: Option<String>,
}

/// Named collections of embedded documents.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create an empty collection using cosine distance.
    ///
    /// Fails with [`VectorError::CollectionExists`] on duplicates.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), VectorError>;

    /// Names of all collections.
    async fn list_collections(&self) -> Result<Vec<String>, VectorError>;

    /// Insert or replace points. Returns the number written.
    async fn upsert(&self, collection: &str, points: Vec<DocumentPoint>)
    -> Result<usize, VectorError>;

    /// Nearest neighbours of `vector`, best first, at most `limit`.
    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorError>;

    /// Cheap connectivity probe for `/health`.
    async fn health_check(&self) -> Result<(), VectorError>;
}

/// Reject names the backends would mangle or refuse.
pub fn validate_collection_name(name: &str) -> Result<(), VectorError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_COLLECTION_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(VectorError::InvalidCollectionName(name.to_string()))
    }
}

/// Cosine similarity; `0.0` when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}
