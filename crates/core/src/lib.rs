//! # PitchScout Core
//!
//! Domain types, traits, and error definitions for the PitchScout pitcher
//! Q&A service. This crate has **no framework dependencies**: it defines the
//! domain model that every other crate implements against.
//!
//! ## Collaborators as traits
//!
//! The answer engine talks to three external services, each defined here as
//! a trait with implementations in other crates:
//! - [`Provider`]: LLM chat completions and embeddings
//! - [`VectorStore`] / [`StoreConnector`]: pitch-event document retrieval
//! - [`ConversationMemory`] / [`MemoryFactory`]: per-user rolling history

pub mod error;
pub mod memory;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MemoryError, ProviderError, StoreError};
pub use memory::{ConversationMemory, MemoryFactory, Turn};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use retrieval::{Document, MetadataFilter, RetrievalQuery, StoreConnector, VectorStore};
pub use token::estimate_tokens;
