//! The answer engine: question in, grounded answer out.
//!
//! One call runs the whole pipeline for a user:
//!
//! 1. **Connect** to the vector store (once per process)
//! 2. **Extract players** from the question, or recall them from history
//! 3. **Detect a topic switch** and reset memory if the players changed
//! 4. **Size retrieval** with the adaptive bisection
//! 5. **Condense** a follow-up into a standalone question, **retrieve** at
//!    the chosen width and **generate**. Each attempt redoes all three;
//!    quota exhaustion and empty answers are retried
//! 6. **Remember** the turn
//!
//! Requests from one user are serialized; different users run concurrently.

use std::sync::Arc;
use std::time::Duration;

use pitchscout_core::error::{ProviderError, StoreError};
use pitchscout_core::memory::Turn;
use pitchscout_core::message::Message;
use pitchscout_core::provider::{Provider, ProviderRequest};
use pitchscout_core::retrieval::{RetrievalQuery, StoreConnector, VectorStore, join_documents};
use pitchscout_memory::{LazyVectorStore, SessionStore, SwitchOutcome};
use pitchscout_providers::retry::{RetryOutcome, RetryPolicy, Verdict, retry};
use tracing::{debug, info, warn};

use crate::prompt;
use crate::retrieval::{AdaptiveRetriever, RetrievalBounds, RetrievalError, RetrievalPlan};
use crate::roster::Roster;

/// Why a question could not be answered. The `Display` text is what the
/// user sees.
#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("❌ 初始化向量庫失敗: {0}")]
    StoreInit(StoreError),

    #[error("⚠️ 找不到符合 token 限制或向量庫沒有相關文件。")]
    NoMatchingData(#[from] RetrievalError),

    #[error("❌ 發生錯誤：{0}")]
    Retrieval(StoreError),

    #[error("❌ 發生錯誤：{0}")]
    Generation(ProviderError),

    #[error("❌ 多次嘗試仍失敗，請稍後再試或檢查配額。")]
    Exhausted { attempts: usize },
}

/// Model and retry settings for the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub bounds: RetrievalBounds,
    pub max_attempts: usize,
    pub quota_cooldown: Duration,
    pub empty_answer_cooldown: Duration,
    /// Recent history messages scanned for a player name.
    pub history_scan: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-pro".into(),
            temperature: 0.0,
            max_tokens: None,
            bounds: RetrievalBounds::default(),
            max_attempts: 9,
            quota_cooldown: Duration::from_secs(61),
            empty_answer_cooldown: Duration::from_secs(3),
            history_scan: 4,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &pitchscout_config::AppConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            bounds: RetrievalBounds {
                max_tokens: config.retrieval.max_tokens,
                max_k: config.retrieval.max_k,
                min_k: config.retrieval.min_k,
            },
            max_attempts: config.generation.max_attempts,
            quota_cooldown: Duration::from_secs(config.generation.quota_cooldown_secs),
            empty_answer_cooldown: Duration::from_secs(config.generation.empty_answer_cooldown_secs),
            history_scan: config.memory.history_scan_messages,
        }
    }
}

/// What happened while answering, for callers that want more than text.
#[derive(Debug, Clone)]
pub struct AnswerReport {
    pub answer: String,
    pub players: Vec<String>,
    pub switch: SwitchOutcome,
    pub k: usize,
    pub attempts: usize,
}

pub struct AnswerEngine {
    provider: Arc<dyn Provider>,
    store: LazyVectorStore,
    sessions: Arc<SessionStore>,
    roster: Roster,
    retriever: AdaptiveRetriever,
    settings: EngineSettings,
}

impl AnswerEngine {
    pub fn new(
        provider: Arc<dyn Provider>,
        connector: Arc<dyn StoreConnector>,
        sessions: Arc<SessionStore>,
        roster: Roster,
        settings: EngineSettings,
    ) -> Self {
        Self {
            provider,
            store: LazyVectorStore::new(connector),
            sessions,
            roster,
            retriever: AdaptiveRetriever::new(settings.bounds),
            settings,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn store(&self) -> &LazyVectorStore {
        &self.store
    }

    /// Answer a question for a user. Never fails: every error becomes a
    /// user-facing message.
    pub async fn answer(&self, question: &str, user_id: &str) -> String {
        match self.answer_detailed(question, user_id).await {
            Ok(report) => report.answer,
            Err(e) => {
                warn!(user_id, error = ?e, "Answer failed");
                e.to_string()
            }
        }
    }

    /// Answer a question, reporting failures as errors.
    pub async fn answer_detailed(
        &self,
        question: &str,
        user_id: &str,
    ) -> Result<AnswerReport, AnswerError> {
        let _session = self.sessions.lock_user(user_id).await;

        let store = self.store.get().await.map_err(AnswerError::StoreInit)?;

        let players = self.resolve_players(question, user_id).await;
        let switch = self.sessions.detect_switch(user_id, &players);

        let plan = self
            .retriever
            .plan(store.as_ref(), question, &players)
            .await?;

        let memory = self.sessions.get_or_create(user_id);
        let history = memory.load_history().await;

        info!(
            user_id,
            players = ?players,
            k = plan.k,
            history = history.len(),
            "Generating answer"
        );

        let store = store.as_ref();
        let history = history.as_slice();
        let plan = &plan;
        let outcome = retry(
            RetryPolicy::new(self.settings.max_attempts),
            |result: &Result<String, AnswerError>| self.classify(result),
            move |attempt| {
                info!(user_id, attempt = attempt + 1, "Calling provider");
                self.attempt(store, history, question, plan)
            },
        )
        .await;

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                if let Err(e) = memory.append(Turn::new(question, value.clone())).await {
                    warn!(user_id, error = %e, "Failed to update conversation memory");
                }
                info!(user_id, attempts, "Answer ready");
                Ok(AnswerReport {
                    answer: value,
                    players,
                    switch,
                    k: plan.k,
                    attempts,
                })
            }
            RetryOutcome::Aborted { error, .. } => Err(error),
            RetryOutcome::Exhausted { attempts } => Err(AnswerError::Exhausted { attempts }),
        }
    }

    /// One generation attempt: condense a follow-up against the history,
    /// retrieve at the planned width, then answer from that context.
    async fn attempt(
        &self,
        store: &dyn VectorStore,
        history: &[Message],
        question: &str,
        plan: &RetrievalPlan,
    ) -> Result<String, AnswerError> {
        let standalone = if history.is_empty() {
            question.to_string()
        } else {
            self.condense(history, question).await?
        };

        let docs = store
            .query(&RetrievalQuery {
                text: standalone.clone(),
                k: plan.k,
                filter: plan.filter.clone(),
            })
            .await
            .map_err(AnswerError::Retrieval)?;
        debug!(documents = docs.len(), "Retrieved answer context");

        let messages = prompt::build_messages(history, &join_documents(&docs), &standalone);
        self.complete(messages).await
    }

    /// Rewrite a follow-up as a standalone question. An empty rewrite keeps
    /// the question as asked.
    async fn condense(&self, history: &[Message], question: &str) -> Result<String, AnswerError> {
        let rewritten = self
            .complete(prompt::condense_messages(history, question))
            .await?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            warn!("Condensed question came back empty, using the original");
            return Ok(question.to_string());
        }
        debug!(question, standalone = rewritten, "Condensed follow-up");
        Ok(rewritten.to_string())
    }

    async fn complete(&self, messages: Vec<Message>) -> Result<String, AnswerError> {
        let request = ProviderRequest {
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            ..ProviderRequest::new(self.settings.model.clone(), messages)
        };
        self.provider
            .complete(request)
            .await
            .map(|response| response.message.content)
            .map_err(AnswerError::Generation)
    }

    /// Players named in the question, else recalled from the live memory.
    async fn resolve_players(&self, question: &str, user_id: &str) -> Vec<String> {
        let players = self.roster.extract(question);
        if !players.is_empty() {
            return players;
        }
        match self.sessions.memory(user_id) {
            Some(memory) => {
                let history = memory.load_history().await;
                self.roster.recall(&history, self.settings.history_scan)
            }
            None => Vec::new(),
        }
    }

    fn classify(&self, result: &Result<String, AnswerError>) -> Verdict {
        match result {
            Ok(answer) if answer.trim().is_empty() => Verdict::Retry {
                cooldown: self.settings.empty_answer_cooldown,
                reason: "empty answer",
            },
            Ok(_) => Verdict::Accept,
            Err(AnswerError::Generation(e)) if e.is_quota_exhausted() => Verdict::Retry {
                cooldown: self.settings.quota_cooldown,
                reason: "quota exhausted",
            },
            Err(_) => Verdict::Abort,
        }
    }
}
