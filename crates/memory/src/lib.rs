//! Memory system implementations for PitchScout.
//!
//! Two kinds of memory live here: per-user conversation memory (the
//! summary buffer and the session store that owns it) and the document
//! memory the answers are grounded on (vector store adapters, lazy
//! connection, ingestion).

pub mod chroma;
pub mod conversation;
pub mod ingest;
pub mod lazy;
pub mod sessions;
pub mod vector;

pub use chroma::{ChromaConnector, ChromaStore};
pub use conversation::{SummaryBufferFactory, SummaryBufferMemory};
pub use ingest::{IngestError, IngestReport, group_records, ingest, parse_jsonl};
pub use lazy::LazyVectorStore;
pub use sessions::{SessionLimits, SessionStore, SwitchOutcome};
pub use vector::{InMemoryConnector, InMemoryVectorStore, ProviderEmbedder, cosine_similarity};
