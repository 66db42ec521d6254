//! OpenAI-compatible embeddings client.

use super::Embedder;
use crate::{AuthStyle, LlmError, REQUEST_TIMEOUT, with_auth};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default embeddings endpoint.
pub const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Default embedding model and its vector length.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// Inputs per HTTP request.
const BATCH_SIZE: usize = 64;

/// Endpoint configuration for [`OpenAiEmbeddings`].
#[derive(Debug, Clone)]
pub struct EmbeddingsConfig {
    /// Full embeddings URL, including any `api-version` query.
    pub url: String,
    pub api_key: String,
    pub auth_style: AuthStyle,
    /// Sent as `model`; Azure deployments leave it `None`.
    pub model: Option<String>,
    pub dimensions: usize,
}

impl EmbeddingsConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            url: OPENAI_EMBEDDINGS_URL.to_string(),
            api_key: api_key.into(),
            auth_style: AuthStyle::Bearer,
            model: Some(DEFAULT_EMBEDDING_MODEL.to_string()),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }

    pub fn azure(
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            url: format!(
                "{}/openai/deployments/{deployment}/embeddings?api-version={api_version}",
                endpoint.trim_end_matches('/')
            ),
            api_key: api_key.into(),
            auth_style: AuthStyle::ApiKeyHeader,
            model: None,
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// HTTP [`Embedder`].
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    config: EmbeddingsConfig,
}

impl OpenAiEmbeddings {
    pub fn new(config: EmbeddingsConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("docs-agent/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let body = EmbeddingsRequest {
            input: batch,
            model: self.config.model.as_deref(),
        };
        let resp = with_auth(
            self.client.post(&self.config.url),
            self.config.auth_style,
            &self.config.api_key,
        )
        .json(&body)
        .send()
        .await
        .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| LlmError::Request(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(LlmError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        order_embeddings(&text, batch.len())
    }
}

/// Parse a response body and put vectors back in input order.
fn order_embeddings(text: &str, expected: usize) -> Result<Vec<Vec<f32>>, LlmError> {
    let parsed: EmbeddingsResponse =
        serde_json::from_str(text).map_err(|e| LlmError::Decode(e.to_string()))?;
    if parsed.data.len() != expected {
        return Err(LlmError::Decode(format!(
            "expected {expected} embeddings, got {}",
            parsed.data.len()
        )));
    }
    let mut items = parsed.data;
    items.sort_by_key(|item| item.index);
    Ok(items.into_iter().map(|item| item.embedding).collect())
}

#[async_trait]
impl Embedder for OpenAiEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        // Batches go out concurrently; try_join_all keeps them in input order.
        let batches = texts.chunks(BATCH_SIZE).map(|batch| self.embed_batch(batch));
        let vectors: Vec<Vec<f32>> = futures::future::try_join_all(batches)
            .await?
            .into_iter()
            .flatten()
            .collect();
        debug!(count = vectors.len(), "Embedded documents");
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_reordered_by_index() {
        let body = r#"{"data": [
            {"index": 1, "embedding": [0.0, 1.0]},
            {"index": 0, "embedding": [1.0, 0.0]}
        ]}"#;
        let vectors = order_embeddings(body, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn count_mismatch_is_an_error() {
        let body = r#"{"data": [{"index": 0, "embedding": [1.0]}]}"#;
        assert!(matches!(order_embeddings(body, 2), Err(LlmError::Decode(_))));
    }

    #[test]
    fn azure_url_and_no_model() {
        let cfg = EmbeddingsConfig::azure("https://acme.openai.azure.com", "ada", "2024-02-01", "k");
        assert!(cfg.url.ends_with("/openai/deployments/ada/embeddings?api-version=2024-02-01"));
        assert!(cfg.model.is_none());
    }
}
