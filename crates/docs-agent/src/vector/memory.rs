//! Process-local vector store.

use super::{DocumentPoint, ScoredPoint, VectorStore, cosine_similarity, validate_collection_name};
use crate::error::VectorError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Collection {
    dimensions: usize,
    points: Vec<DocumentPoint>,
}

/// A [`VectorStore`] that keeps everything in memory with brute-force cosine
/// search. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<BTreeMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> VectorError {
        VectorError::Backend("in-memory store lock poisoned".into())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), VectorError> {
        validate_collection_name(name)?;
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        if collections.contains_key(name) {
            return Err(VectorError::CollectionExists(name.to_string()));
        }
        collections.insert(
            name.to_string(),
            Collection {
                dimensions,
                points: Vec::new(),
            },
        );
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, VectorError> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(collections.keys().cloned().collect())
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<DocumentPoint>,
    ) -> Result<usize, VectorError> {
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| VectorError::CollectionNotFound(collection.to_string()))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != target.dimensions) {
            return Err(VectorError::DimensionMismatch {
                expected: target.dimensions,
                actual: bad.vector.len(),
            });
        }

        let count = points.len();
        for point in points {
            match target.points.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point,
                None => target.points.push(point),
            }
        }
        Ok(count)
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorError> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        let target = collections
            .get(collection)
            .ok_or_else(|| VectorError::CollectionNotFound(collection.to_string()))?;

        let mut hits: Vec<ScoredPoint> = target
            .points
            .iter()
            .map(|p| ScoredPoint {
                id: p.id.to_string(),
                score: cosine_similarity(&vector, &p.vector),
                text: Some(p.text.clone()),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn health_check(&self) -> Result<(), VectorError> {
        self.collections
            .read()
            .map(|_| ())
            .map_err(|_| Self::poisoned())
    }
}
