//! Conversation memory trait: the per-user rolling history.
//!
//! A memory records (question, answer) turns and compacts itself once it
//! grows past a size threshold. The answer engine only ever appends turns
//! and reads the history back; it never edits entries in place.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;
use crate::message::Message;

/// One question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

impl Turn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// The turn as a user message followed by an assistant message.
    pub fn into_messages(self) -> [Message; 2] {
        [Message::user(self.question), Message::assistant(self.answer)]
    }
}

/// The core ConversationMemory trait.
#[async_trait]
pub trait ConversationMemory: Send + Sync {
    /// Record a completed turn. Implementations compact themselves here if
    /// the buffer overflows.
    async fn append(&self, turn: Turn) -> std::result::Result<(), MemoryError>;

    /// Fold the oldest buffered messages into the running summary while the
    /// buffer is over its limit. Returns `true` if anything was folded.
    async fn summarize_on_overflow(&self) -> std::result::Result<bool, MemoryError>;

    /// The history in chronological order. A summary, if present, comes
    /// first as a system message.
    async fn load_history(&self) -> Vec<Message>;
}

/// Creates fresh, empty memories. One is created per user session, and
/// again after every topic switch.
pub trait MemoryFactory: Send + Sync {
    fn create(&self) -> Arc<dyn ConversationMemory>;
}
