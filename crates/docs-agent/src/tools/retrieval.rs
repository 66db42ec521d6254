//! Vector-store tools: search, ingestion and collection management.
//!
//! | Tool | Result |
//! |------|--------|
//! | [`SemanticSearch`] | matching texts joined by a blank line, or [`NO_RESULTS`] |
//! | [`AddDocuments`] | `{"result": "N documents added to 'c'.", "count": N}` |
//! | [`CreateCollection`] | `{"result": "Collection 'c' created successfully."}` |
//! | [`ListCollections`] | JSON array of names |
//!
//! Failures come back as `"Error: ..."` text (search) or `{"error": ...}`
//! objects (everything else).

use super::core::{Tool, ToolFuture, parse_tool_args};
use super::names::ToolName;
use crate::error::VectorError;
use crate::vector::{DocumentPoint, Embedder, VectorStore, validate_collection_name};
use crate::{ToolDef, json_schema_for};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Returned by `semantic_search` when nothing matched.
pub const NO_RESULTS: &str =
    "No relevant documents found for this query in the specified collection.";

/// Default number of search hits.
pub const DEFAULT_TOP_K: u32 = 5;

/// Upper bound on requested search hits.
pub const MAX_TOP_K: u32 = 50;

// ── Typed argument structs ──────────────────────────────────────────

/// Typed arguments for `semantic_search`.
#[derive(Deserialize, JsonSchema)]
pub struct SemanticSearchArgs {
    /// Natural-language search query.
    pub query: String,
    /// Collection to search (e.g. 'api_docs').
    pub collection: String,
    /// Number of documents to return (default 5, max 50).
    #[serde(default)]
    pub top_k: Option<u32>,
}

/// Typed arguments for `add_documents`.
#[derive(Deserialize, JsonSchema)]
pub struct AddDocumentsArgs {
    /// Target collection. Must already exist.
    pub collection_name: String,
    /// Document texts to embed and store.
    pub documents: Vec<String>,
}

/// Typed arguments for `create_collection`.
#[derive(Deserialize, JsonSchema)]
pub struct CreateCollectionArgs {
    /// New collection name: letters, digits, '_' or '-'.
    pub collection_name: String,
}

/// `list_collections` takes no arguments.
#[derive(Deserialize, JsonSchema)]
pub struct ListCollectionsArgs {}

fn error_json(message: impl std::fmt::Display) -> String {
    json!({ "error": message.to_string() }).to_string()
}

// ── SemanticSearch ──────────────────────────────────────────────────

/// Embed a query and return the text of the nearest documents.
pub struct SemanticSearch {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl SemanticSearch {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    async fn run(&self, args: SemanticSearchArgs) -> String {
        let limit = args.top_k.unwrap_or(DEFAULT_TOP_K).clamp(1, MAX_TOP_K) as usize;

        let vector = match self.embedder.embed_query(&args.query).await {
            Ok(v) => v,
            Err(e) => return format!("Error: failed to embed query: {e}"),
        };

        let hits = match self.store.search(&args.collection, vector, limit).await {
            Ok(hits) => hits,
            Err(VectorError::CollectionNotFound(name)) => {
                return format!("Error: collection '{name}' not found");
            }
            Err(e) => return format!("Error: search failed: {e}"),
        };

        debug!(collection = %args.collection, hits = hits.len(), "Semantic search");
        let texts: Vec<String> = hits
            .into_iter()
            .filter_map(|hit| hit.text)
            .filter(|text| !text.is_empty())
            .collect();

        if texts.is_empty() {
            NO_RESULTS.to_string()
        } else {
            texts.join("\n\n")
        }
    }
}

impl Tool for SemanticSearch {
    fn name(&self) -> ToolName {
        ToolName::SemanticSearch
    }

    fn definition(&self) -> ToolDef {
        ToolDef::new(
            self.name().as_str(),
            "Search a document collection for passages relevant to a query. \
             Use this before answering questions about documented APIs or products. \
             Returns the matching passages separated by blank lines.",
            json_schema_for::<SemanticSearchArgs>(),
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<SemanticSearchArgs>(arguments);
        Box::pin(async move {
            match parsed {
                Ok(args) => self.run(args).await,
                Err(e) => e,
            }
        })
    }
}

// ── AddDocuments ────────────────────────────────────────────────────

/// Embed documents and upsert them into an existing collection.
pub struct AddDocuments {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl AddDocuments {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    async fn run(&self, args: AddDocumentsArgs) -> String {
        let collection = args.collection_name;
        if let Err(e) = validate_collection_name(&collection) {
            return error_json(e);
        }
        if args.documents.is_empty() {
            return added(&collection, 0);
        }

        let vectors = match self.embedder.embed_documents(&args.documents).await {
            Ok(v) => v,
            Err(e) => return error_json(format!("failed to embed documents: {e}")),
        };

        let points: Vec<DocumentPoint> = vectors
            .into_iter()
            .zip(args.documents)
            .map(|(vector, text)| DocumentPoint::new(vector, text))
            .collect();

        match self.store.upsert(&collection, points).await {
            Ok(count) => added(&collection, count),
            Err(e) => {
                warn!(collection = %collection, error = %e, "add_documents failed");
                error_json(e)
            }
        }
    }
}

fn added(collection: &str, count: usize) -> String {
    json!({
        "result": format!("{count} documents added to '{collection}'."),
        "count": count,
    })
    .to_string()
}

impl Tool for AddDocuments {
    fn name(&self) -> ToolName {
        ToolName::AddDocuments
    }

    fn definition(&self) -> ToolDef {
        ToolDef::new(
            self.name().as_str(),
            "Embed and store documents in an existing collection so they become searchable. \
             Create the collection first with create_collection if it does not exist.",
            json_schema_for::<AddDocumentsArgs>(),
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<AddDocumentsArgs>(arguments);
        Box::pin(async move {
            match parsed {
                Ok(args) => self.run(args).await,
                Err(e) => error_json(e),
            }
        })
    }
}

// ── CreateCollection ────────────────────────────────────────────────

/// Create an empty collection sized for the configured embedder.
pub struct CreateCollection {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl CreateCollection {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }
}

impl Tool for CreateCollection {
    fn name(&self) -> ToolName {
        ToolName::CreateCollection
    }

    fn definition(&self) -> ToolDef {
        ToolDef::new(
            self.name().as_str(),
            "Create a new, empty document collection. Fails if the name is taken.",
            json_schema_for::<CreateCollectionArgs>(),
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<CreateCollectionArgs>(arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return error_json(e),
            };
            let name = args.collection_name;
            match self
                .store
                .create_collection(&name, self.embedder.dimensions())
                .await
            {
                Ok(()) => json!({ "result": format!("Collection '{name}' created successfully.") })
                    .to_string(),
                Err(e) => error_json(e),
            }
        })
    }
}

// ── ListCollections ─────────────────────────────────────────────────

/// Names of all collections. Backend errors yield an empty list.
pub struct ListCollections {
    store: Arc<dyn VectorStore>,
}

impl ListCollections {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }
}

impl Tool for ListCollections {
    fn name(&self) -> ToolName {
        ToolName::ListCollections
    }

    fn definition(&self) -> ToolDef {
        ToolDef::new(
            self.name().as_str(),
            "List the names of all document collections.",
            json_schema_for::<ListCollectionsArgs>(),
        )
    }

    fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
        Box::pin(async move {
            let names = match self.store.list_collections().await {
                Ok(names) => names,
                Err(e) => {
                    warn!(error = %e, "list_collections failed; reporting none");
                    Vec::new()
                }
            };
            serde_json::to_string(&names).unwrap_or_else(|_| "[]".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::HashEmbedder;
    use crate::vector::InMemoryVectorStore;
    use serde_json::Value;

    fn backends() -> (Arc<dyn VectorStore>, Arc<dyn Embedder>) {
        (
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(HashEmbedder::new(64)),
        )
    }

    #[tokio::test]
    async fn create_add_and_search() {
        let (store, embedder) = backends();
        let create = CreateCollection::new(store.clone(), embedder.clone());
        let add = AddDocuments::new(store.clone(), embedder.clone());
        let search = SemanticSearch::new(store.clone(), embedder.clone());

        let out = create.execute(r#"{"collection_name": "api_docs"}"#).await;
        assert_eq!(
            out,
            r#"{"result":"Collection 'api_docs' created successfully."}"#
        );

        let out = add
            .execute(
                r#"{"collection_name": "api_docs", "documents": [
                    "POST /auth/login returns an access token",
                    "GET /health reports database status"
                ]}"#,
            )
            .await;
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["count"], 2);
        assert_eq!(v["result"], "2 documents added to 'api_docs'.");

        let out = search
            .execute(r#"{"query": "login access token", "collection": "api_docs", "top_k": 1}"#)
            .await;
        assert_eq!(out, "POST /auth/login returns an access token");

        let out = search
            .execute(r#"{"query": "login", "collection": "api_docs"}"#)
            .await;
        assert_eq!(out.split("\n\n").count(), 2);
    }

    #[tokio::test]
    async fn empty_collection_returns_sentinel() {
        let (store, embedder) = backends();
        store.create_collection("empty", embedder.dimensions()).await.unwrap();
        let search = SemanticSearch::new(store, embedder);
        let out = search
            .execute(r#"{"query": "anything", "collection": "empty"}"#)
            .await;
        assert_eq!(out, NO_RESULTS);
    }

    #[tokio::test]
    async fn missing_collection_is_text_error() {
        let (store, embedder) = backends();
        let search = SemanticSearch::new(store, embedder);
        let out = search
            .execute(r#"{"query": "anything", "collection": "nope"}"#)
            .await;
        assert_eq!(out, "Error: collection 'nope' not found");
    }

    #[tokio::test]
    async fn empty_document_list_is_a_noop() {
        let (store, embedder) = backends();
        let add = AddDocuments::new(store, embedder);
        // The collection does not exist; an empty batch never reaches the store.
        let out = add
            .execute(r#"{"collection_name": "later", "documents": []}"#)
            .await;
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["count"], 0);
    }

    #[tokio::test]
    async fn duplicate_and_invalid_names_are_structured_errors() {
        let (store, embedder) = backends();
        let create = CreateCollection::new(store, embedder);
        create.execute(r#"{"collection_name": "dup"}"#).await;
        let v: Value =
            serde_json::from_str(&create.execute(r#"{"collection_name": "dup"}"#).await).unwrap();
        assert!(v["error"].as_str().unwrap().contains("already exists"));

        let v: Value =
            serde_json::from_str(&create.execute(r#"{"collection_name": "a b"}"#).await).unwrap();
        assert!(v.get("error").is_some());
    }

    #[tokio::test]
    async fn list_collections_on_empty_store() {
        let (store, embedder) = backends();
        let list = ListCollections::new(store.clone());
        assert_eq!(list.execute("{}").await, "[]");

        store.create_collection("b", embedder.dimensions()).await.unwrap();
        store.create_collection("a", embedder.dimensions()).await.unwrap();
        assert_eq!(list.execute("{}").await, r#"["a","b"]"#);
    }

    #[test]
    fn schemas_mark_required_fields() {
        let (store, embedder) = backends();
        let def = SemanticSearch::new(store, embedder).definition();
        let required = def.function.parameters["required"].as_array().unwrap().clone();
        assert!(required.contains(&"query".into()));
        assert!(required.contains(&"collection".into()));
        assert!(!required.contains(&"top_k".into()));
    }
}
