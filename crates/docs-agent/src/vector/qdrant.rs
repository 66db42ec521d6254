//! Qdrant-backed document collections.
//!
//! Points carry a UUID id, the embedding, and a `{"text": ...}` payload.
//! Collections use cosine distance.

use super::{
    DocumentPoint, ScoredPoint, TEXT_PAYLOAD_KEY, VectorStore, validate_collection_name,
};
use crate::error::VectorError;
use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointId, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use std::collections::HashMap;
use tracing::{debug, info};

/// [`VectorStore`] over a Qdrant server (gRPC, usually port 6334).
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Build a client. No network traffic happens until the first call.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, VectorError> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder.build().map_err(backend)?;
        Ok(Self { client })
    }
}

fn backend(e: impl std::fmt::Display) -> VectorError {
    VectorError::Backend(e.to_string())
}

fn to_point(point: DocumentPoint) -> PointStruct {
    let payload: HashMap<String, Value> =
        HashMap::from([(TEXT_PAYLOAD_KEY.to_string(), Value::from(point.text))]);
    PointStruct::new(PointId::from(point.id.to_string()), point.vector, payload)
}

fn point_id_string(id: Option<PointId>) -> String {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), VectorError> {
        validate_collection_name(name)?;
        if self.client.collection_exists(name).await.map_err(backend)? {
            return Err(VectorError::CollectionExists(name.to_string()));
        }
        info!(collection = name, dimensions, "Creating Qdrant collection");
        let params = VectorParamsBuilder::new(dimensions as u64, Distance::Cosine);
        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(params))
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, VectorError> {
        let response = self.client.list_collections().await.map_err(backend)?;
        Ok(response.collections.into_iter().map(|c| c.name).collect())
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<DocumentPoint>,
    ) -> Result<usize, VectorError> {
        validate_collection_name(collection)?;
        let count = points.len();
        let points: Vec<PointStruct> = points.into_iter().map(to_point).collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(backend)?;
        debug!(collection, count, "Upserted points");
        Ok(count)
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorError> {
        validate_collection_name(collection)?;
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector, limit as u64).with_payload(true),
            )
            .await
            .map_err(backend)?;

        Ok(response
            .result
            .into_iter()
            .map(|point| ScoredPoint {
                id: point_id_string(point.id),
                score: point.score,
                text: point
                    .payload
                    .get(TEXT_PAYLOAD_KEY)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
            })
            .collect())
    }

    async fn health_check(&self) -> Result<(), VectorError> {
        self.client.health_check().await.map(|_| ()).map_err(backend)
    }
}
