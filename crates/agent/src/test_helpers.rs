//! Shared test doubles for the answer pipeline.

use async_trait::async_trait;
use pitchscout_core::error::{MemoryError, ProviderError, StoreError};
use pitchscout_core::memory::{ConversationMemory, MemoryFactory, Turn};
use pitchscout_core::message::Message;
use pitchscout_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use pitchscout_core::retrieval::{
    Document, MetadataFilter, PLAYER_FIELD, RetrievalQuery, StoreConnector, VectorStore,
    join_documents,
};
use pitchscout_core::token::estimate_tokens;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A mock provider that replays a script of answers and failures.
///
/// Once the script runs out, the last entry repeats.
pub struct ScriptedProvider {
    script: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<&str, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|r| r.map(str::to_string))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(answer: &str) -> Self {
        Self::new(vec![Ok(answer)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn quota() -> ProviderError {
    ProviderError::QuotaExhausted {
        retry_after_secs: 61,
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);

        let next = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script
                    .first()
                    .cloned()
                    .expect("ScriptedProvider: empty script")
            }
        };

        next.map(|text| ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model,
        })
    }
}

/// A store holding `available` identical-length documents. A query for `k`
/// returns `min(k, available)` of them, so context size grows linearly.
pub struct LinearStore {
    available: usize,
    doc_chars: usize,
    fail_below: usize,
    probes: Mutex<Vec<usize>>,
    filters: Mutex<Vec<Option<MetadataFilter>>>,
    texts: Mutex<Vec<String>>,
}

impl LinearStore {
    pub fn new(available: usize, doc_chars: usize) -> Self {
        Self {
            available,
            doc_chars,
            fail_below: 0,
            probes: Mutex::new(Vec::new()),
            filters: Mutex::new(Vec::new()),
            texts: Mutex::new(Vec::new()),
        }
    }

    /// Queries for fewer than `k` documents fail.
    pub fn failing_below(mut self, k: usize) -> Self {
        self.fail_below = k;
        self
    }

    fn docs(&self, k: usize, player: Option<&str>) -> Vec<Document> {
        (0..k.min(self.available))
            .map(|i| {
                let doc = Document::new(format!("doc{i}"), "a".repeat(self.doc_chars));
                match player {
                    Some(p) => doc.with_meta(PLAYER_FIELD, p),
                    None => doc,
                }
            })
            .collect()
    }

    /// Estimated tokens of the context a `k` query produces.
    pub fn tokens_for(&self, k: usize) -> usize {
        estimate_tokens(&join_documents(&self.docs(k, None)))
    }

    pub fn probed_ks(&self) -> Vec<usize> {
        self.probes.lock().unwrap().clone()
    }

    pub fn filters(&self) -> Vec<Option<MetadataFilter>> {
        self.filters.lock().unwrap().clone()
    }

    pub fn query_texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn saw_filter(&self) -> bool {
        self.filters().iter().all(Option::is_some)
    }
}

#[async_trait]
impl VectorStore for LinearStore {
    fn name(&self) -> &str {
        "linear"
    }

    async fn query(&self, query: &RetrievalQuery) -> Result<Vec<Document>, StoreError> {
        self.probes.lock().unwrap().push(query.k);
        self.filters.lock().unwrap().push(query.filter.clone());
        self.texts.lock().unwrap().push(query.text.clone());
        if query.k < self.fail_below {
            return Err(StoreError::QueryFailed("simulated outage".into()));
        }
        let player = query
            .filter
            .as_ref()
            .and_then(|f| f.values.first())
            .map(String::as_str);
        Ok(self.docs(query.k, player))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.available)
    }
}

/// Hands out a fixed store, failing the first `failures` connects.
pub struct StaticConnector {
    store: Arc<dyn VectorStore>,
    failures: usize,
    connects: AtomicUsize,
}

impl StaticConnector {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            failures: 0,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for StaticConnector {
    fn describe(&self) -> String {
        format!("static {}", self.store.name())
    }

    async fn connect(&self) -> Result<Arc<dyn VectorStore>, StoreError> {
        let n = self.connects.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(self.store.clone())
    }
}

/// Memory that keeps every turn verbatim.
#[derive(Default)]
pub struct VecMemory {
    turns: Mutex<Vec<Turn>>,
}

#[async_trait]
impl ConversationMemory for VecMemory {
    async fn append(&self, turn: Turn) -> Result<(), MemoryError> {
        self.turns.lock().unwrap().push(turn);
        Ok(())
    }

    async fn summarize_on_overflow(&self) -> Result<bool, MemoryError> {
        Ok(false)
    }

    async fn load_history(&self) -> Vec<Message> {
        self.turns
            .lock()
            .unwrap()
            .iter()
            .cloned()
            .flat_map(Turn::into_messages)
            .collect()
    }
}

#[derive(Default)]
pub struct VecMemoryFactory {
    created: AtomicUsize,
}

impl VecMemoryFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl MemoryFactory for VecMemoryFactory {
    fn create(&self) -> Arc<dyn ConversationMemory> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(VecMemory::default())
    }
}
