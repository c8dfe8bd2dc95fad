//! Vector store traits: retrieval of pitch-event documents.
//!
//! The store is an external collaborator: the core only needs top-k
//! similarity search with an optional metadata filter, plus writes for
//! ingestion. Implementations: Chroma over HTTP, in-memory (for testing).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::StoreError;

/// Metadata field that carries the pitcher's full name.
pub const PLAYER_FIELD: &str = "player_name";

/// Separator placed between document texts in an assembled context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// A stored document: one player's pitch events for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable document ID
    pub id: String,

    /// The document text handed to the LLM
    pub text: String,

    /// Flat metadata (`player_name`, `game_date`, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Builder-style metadata insertion.
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Read a string metadata field.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Set-membership filter on a metadata field (`field IN values`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub field: String,
    pub values: Vec<String>,
}

impl MetadataFilter {
    /// Filter on the player-name field. Returns `None` for an empty player
    /// list, meaning "search everything".
    pub fn players(players: &[String]) -> Option<Self> {
        if players.is_empty() {
            return None;
        }
        Some(Self {
            field: PLAYER_FIELD.to_string(),
            values: players.to_vec(),
        })
    }

    /// Whether a document's metadata satisfies this filter.
    pub fn matches(&self, doc: &Document) -> bool {
        doc.meta_str(&self.field)
            .is_some_and(|v| self.values.iter().any(|want| want == v))
    }

    /// Render as a Chroma-style `where` clause: `{"field": {"$in": [...]}}`.
    pub fn to_where_clause(&self) -> serde_json::Value {
        let mut clause = serde_json::Map::new();
        clause.insert(
            self.field.clone(),
            serde_json::json!({ "$in": self.values }),
        );
        serde_json::Value::Object(clause)
    }
}

/// One retrieval request. Built fresh for every probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalQuery {
    /// The question text used for similarity search
    pub text: String,

    /// Number of documents requested
    pub k: usize,

    /// Optional metadata filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<MetadataFilter>,
}

/// Join document texts into one context block.
pub fn join_documents(docs: &[Document]) -> String {
    docs.iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// The core VectorStore trait.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name (e.g., "chroma", "in_memory").
    fn name(&self) -> &str;

    /// Top-k similarity search. An empty result is not an error.
    async fn query(&self, query: &RetrievalQuery) -> std::result::Result<Vec<Document>, StoreError>;

    /// Add documents (used by ingestion).
    async fn add(&self, _docs: Vec<Document>) -> std::result::Result<usize, StoreError> {
        Err(StoreError::Unsupported {
            backend: self.name().to_string(),
            operation: "add".into(),
        })
    }

    /// Number of stored documents.
    async fn count(&self) -> std::result::Result<usize, StoreError>;
}

/// Opens a connection to a vector store.
///
/// Connecting can be slow (collection lookup, embedding warm-up), so the
/// answer engine does it lazily on first use and exactly once.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Backend description for diagnostics.
    fn describe(&self) -> String;

    /// Open the store.
    async fn connect(&self) -> std::result::Result<Arc<dyn VectorStore>, StoreError>;
}
