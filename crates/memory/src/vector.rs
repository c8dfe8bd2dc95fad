//! Embeddings and the in-memory vector store.
//!
//! [`ProviderEmbedder`] turns texts into vectors through any embedding
//! `Provider`. [`InMemoryVectorStore`] ranks stored documents by cosine
//! similarity; it is meant for local runs and tests, not large corpora.

use async_trait::async_trait;
use pitchscout_core::error::StoreError;
use pitchscout_core::provider::{EmbeddingRequest, Provider};
use pitchscout_core::retrieval::{Document, RetrievalQuery, StoreConnector, VectorStore};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Embeds texts with a provider's `/embeddings` endpoint.
#[derive(Clone)]
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One vector per input, in input order.
    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, StoreError> {
        let expected = texts.len();
        if expected == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: texts,
            })
            .await
            .map_err(|e| StoreError::EmbeddingFailed(e.to_string()))?;

        if response.embeddings.len() != expected {
            return Err(StoreError::EmbeddingFailed(format!(
                "expected {expected} embeddings, got {}",
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        self.embed(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| StoreError::EmbeddingFailed("no embedding returned".into()))
    }
}

/// A vector store that keeps documents and their embeddings in a Vec.
pub struct InMemoryVectorStore {
    embedder: ProviderEmbedder,
    entries: RwLock<Vec<(Document, Vec<f32>)>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: ProviderEmbedder) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn query(&self, query: &RetrievalQuery) -> Result<Vec<Document>, StoreError> {
        let query_embedding = self.embedder.embed_one(&query.text).await?;
        let entries = self.entries.read().await;

        let mut scored: Vec<(f32, &Document)> = entries
            .iter()
            .filter(|(doc, _)| query.filter.as_ref().is_none_or(|f| f.matches(doc)))
            .map(|(doc, emb)| (cosine_similarity(emb, &query_embedding), doc))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(query.k);

        debug!(k = query.k, returned = scored.len(), "In-memory query");
        Ok(scored.into_iter().map(|(_, doc)| doc.clone()).collect())
    }

    async fn add(&self, docs: Vec<Document>) -> Result<usize, StoreError> {
        let texts = docs.iter().map(|d| d.text.clone()).collect();
        let embeddings = self.embedder.embed(texts).await?;
        let added = docs.len();

        let mut entries = self.entries.write().await;
        for (doc, emb) in docs.into_iter().zip(embeddings) {
            // Re-adding an id replaces the old entry.
            entries.retain(|(existing, _)| existing.id != doc.id);
            entries.push((doc, emb));
        }
        Ok(added)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.entries.read().await.len())
    }
}

/// Hands out one shared [`InMemoryVectorStore`].
pub struct InMemoryConnector {
    store: Arc<InMemoryVectorStore>,
}

impl InMemoryConnector {
    pub fn new(store: Arc<InMemoryVectorStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    fn describe(&self) -> String {
        format!("in-memory store (embedding model {})", self.store.embedder.model())
    }

    async fn connect(&self) -> Result<Arc<dyn VectorStore>, StoreError> {
        Ok(self.store.clone())
    }
}
