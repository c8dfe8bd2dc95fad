//! Summary-buffer conversation memory.
//!
//! Recent turns are kept verbatim. Once the buffer's estimated size passes
//! the limit, the oldest messages are folded into a running summary with
//! one LLM call, so long conversations stay bounded without forgetting
//! which player they were about.

use async_trait::async_trait;
use pitchscout_core::error::MemoryError;
use pitchscout_core::memory::{ConversationMemory, MemoryFactory, Turn};
use pitchscout_core::message::Message;
use pitchscout_core::provider::{Provider, ProviderRequest};
use pitchscout_core::token::estimate_messages_tokens;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const SUMMARY_INSTRUCTIONS: &str = "Progressively summarize the conversation lines provided, \
adding onto the previous summary and returning a new summary. Keep every player name, \
statistic, and date that was mentioned. Write the summary in the conversation's language.";

const SUMMARY_PREFIX: &str = "Summary of the earlier conversation:\n";

#[derive(Default)]
struct BufferState {
    summary: Option<String>,
    buffer: VecDeque<Message>,
}

/// Conversation memory that summarizes its oldest messages on overflow.
pub struct SummaryBufferMemory {
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens: usize,
    state: Mutex<BufferState>,
}

impl SummaryBufferMemory {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, max_tokens: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
            state: Mutex::new(BufferState::default()),
        }
    }

    /// The running summary, if anything has been folded yet.
    pub async fn summary(&self) -> Option<String> {
        self.state.lock().await.summary.clone()
    }

    /// Number of verbatim messages still buffered.
    pub async fn buffered(&self) -> usize {
        self.state.lock().await.buffer.len()
    }

    async fn summarize(
        &self,
        previous: Option<&str>,
        lines: &str,
    ) -> std::result::Result<String, MemoryError> {
        let prompt = format!(
            "Current summary:\n{}\n\nNew lines of conversation:\n{lines}\n\nNew summary:",
            previous.unwrap_or("")
        );
        let request = ProviderRequest::new(
            self.model.clone(),
            vec![Message::system(SUMMARY_INSTRUCTIONS), Message::user(prompt)],
        );

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| MemoryError::SummarizationFailed(e.to_string()))?;

        let summary = response.message.content.trim().to_string();
        if summary.is_empty() {
            return Err(MemoryError::SummarizationFailed(
                "provider returned an empty summary".into(),
            ));
        }
        Ok(summary)
    }
}

fn render_lines(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl ConversationMemory for SummaryBufferMemory {
    async fn append(&self, turn: Turn) -> std::result::Result<(), MemoryError> {
        {
            let mut state = self.state.lock().await;
            state.buffer.extend(turn.into_messages());
        }
        self.summarize_on_overflow().await.map(|_| ())
    }

    async fn summarize_on_overflow(&self) -> std::result::Result<bool, MemoryError> {
        let mut state = self.state.lock().await;

        let mut pruned = Vec::new();
        while !state.buffer.is_empty()
            && estimate_messages_tokens(state.buffer.make_contiguous()) > self.max_tokens
        {
            if let Some(oldest) = state.buffer.pop_front() {
                pruned.push(oldest);
            }
        }

        if pruned.is_empty() {
            return Ok(false);
        }

        let lines = render_lines(&pruned);
        debug!(pruned = pruned.len(), "Folding old messages into summary");

        let result = self.summarize(state.summary.as_deref(), &lines).await;
        match result {
            Ok(summary) => {
                state.summary = Some(summary);
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Summarization failed, keeping raw text");
                state.summary = Some(match state.summary.take() {
                    Some(previous) => format!("{previous}\n{lines}"),
                    None => lines,
                });
                Err(e)
            }
        }
    }

    async fn load_history(&self) -> Vec<Message> {
        let state = self.state.lock().await;
        let mut history = Vec::with_capacity(state.buffer.len() + 1);
        if let Some(summary) = &state.summary {
            history.push(Message::system(format!("{SUMMARY_PREFIX}{summary}")));
        }
        history.extend(state.buffer.iter().cloned());
        history
    }
}

/// Creates a fresh [`SummaryBufferMemory`] per session.
pub struct SummaryBufferFactory {
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens: usize,
}

impl SummaryBufferFactory {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, max_tokens: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
        }
    }
}

impl MemoryFactory for SummaryBufferFactory {
    fn create(&self) -> Arc<dyn ConversationMemory> {
        Arc::new(SummaryBufferMemory::new(
            self.provider.clone(),
            self.model.clone(),
            self.max_tokens,
        ))
    }
}
