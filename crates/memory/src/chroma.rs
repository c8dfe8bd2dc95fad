//! Chroma vector store over its HTTP API (`/api/v1`).
//!
//! The connector resolves the collection (creating it if needed) and
//! returns a store bound to the collection id. Embeddings are computed on
//! our side and sent as `query_embeddings` / `embeddings`.

use async_trait::async_trait;
use pitchscout_core::error::StoreError;
use pitchscout_core::retrieval::{Document, RetrievalQuery, StoreConnector, VectorStore};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::vector::ProviderEmbedder;

/// Opens a [`ChromaStore`] for one collection.
pub struct ChromaConnector {
    base_url: String,
    collection: String,
    embedder: ProviderEmbedder,
    client: reqwest::Client,
}

impl ChromaConnector {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        embedder: ProviderEmbedder,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            embedder,
            client,
        }
    }
}

#[async_trait]
impl StoreConnector for ChromaConnector {
    fn describe(&self) -> String {
        format!(
            "chroma at {} (collection {}, embedding model {})",
            self.base_url,
            self.collection,
            self.embedder.model()
        )
    }

    async fn connect(&self) -> Result<Arc<dyn VectorStore>, StoreError> {
        let url = format!("{}/api/v1/collections", self.base_url);
        let body = serde_json::json!({
            "name": self.collection,
            "get_or_create": true,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", self.base_url)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Unavailable(format!(
                "collection lookup returned {status}: {text}"
            )));
        }

        let collection: CollectionInfo = response
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("bad collection response: {e}")))?;

        info!(
            collection = %collection.name,
            id = %collection.id,
            "Connected to Chroma collection"
        );

        Ok(Arc::new(ChromaStore {
            base_url: self.base_url.clone(),
            collection_id: collection.id,
            embedder: self.embedder.clone(),
            client: self.client.clone(),
        }))
    }
}

/// A Chroma collection.
pub struct ChromaStore {
    base_url: String,
    collection_id: String,
    embedder: ProviderEmbedder,
    client: reqwest::Client,
}

impl ChromaStore {
    fn collection_url(&self, op: &str) -> String {
        format!(
            "{}/api/v1/collections/{}/{op}",
            self.base_url, self.collection_id
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, String> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        warn!(status, body = %text, "Chroma returned error");
        Err(format!("status {status}: {text}"))
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    fn name(&self) -> &str {
        "chroma"
    }

    async fn query(&self, query: &RetrievalQuery) -> Result<Vec<Document>, StoreError> {
        let embedding = self.embedder.embed_one(&query.text).await?;

        let mut body = serde_json::json!({
            "query_embeddings": [embedding],
            "n_results": query.k,
            "include": ["documents", "metadatas"],
        });
        if let Some(filter) = &query.filter {
            body["where"] = filter.to_where_clause();
        }

        let response = self
            .client
            .post(self.collection_url("query"))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        let response = Self::check(response).await.map_err(StoreError::QueryFailed)?;

        let result: QueryResponse = response
            .json()
            .await
            .map_err(|e| StoreError::QueryFailed(format!("bad query response: {e}")))?;

        let docs = result.into_documents();
        debug!(k = query.k, returned = docs.len(), "Chroma query");
        Ok(docs)
    }

    async fn add(&self, docs: Vec<Document>) -> Result<usize, StoreError> {
        if docs.is_empty() {
            return Ok(0);
        }

        let embeddings = self
            .embedder
            .embed(docs.iter().map(|d| d.text.clone()).collect())
            .await?;

        let body = serde_json::json!({
            "ids": docs.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            "embeddings": embeddings,
            "documents": docs.iter().map(|d| d.text.as_str()).collect::<Vec<_>>(),
            "metadatas": docs.iter().map(|d| &d.metadata).collect::<Vec<_>>(),
        });

        let response = self
            .client
            .post(self.collection_url("add"))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Self::check(response).await.map_err(StoreError::WriteFailed)?;

        Ok(docs.len())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let response = self
            .client
            .get(self.collection_url("count"))
            .send()
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        let response = Self::check(response).await.map_err(StoreError::QueryFailed)?;

        response
            .json::<usize>()
            .await
            .map_err(|e| StoreError::QueryFailed(format!("bad count response: {e}")))
    }
}

// --- Chroma API types (internal) ---

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
    name: String,
}

/// Query results come back as one inner list per query embedding.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<serde_json::Map<String, serde_json::Value>>>>>,
}

impl QueryResponse {
    fn into_documents(self) -> Vec<Document> {
        let ids = self.ids.into_iter().next().unwrap_or_default();
        let mut texts = self
            .documents
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default()
            .into_iter();
        let mut metas = self
            .metadatas
            .and_then(|m| m.into_iter().next())
            .unwrap_or_default()
            .into_iter();

        ids.into_iter()
            .map(|id| Document {
                id,
                text: texts.next().flatten().unwrap_or_default(),
                metadata: metas.next().flatten().unwrap_or_default(),
            })
            .collect()
    }
}
