//! End-to-end tests for the PitchScout answer pipeline.
//!
//! Pitch records go through ingestion into an in-memory vector store, then
//! questions run through the full engine: player resolution, topic
//! tracking, adaptive retrieval, generation and conversation memory.

use std::sync::{Arc, Mutex};

use pitchscout_agent::{AnswerEngine, EngineSettings, Roster};
use pitchscout_core::error::ProviderError;
use pitchscout_core::message::{Message, Role};
use pitchscout_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};
use pitchscout_core::retrieval::StoreConnector;
use pitchscout_memory::{
    InMemoryConnector, InMemoryVectorStore, ProviderEmbedder, SessionLimits, SessionStore,
    SummaryBufferFactory, SwitchOutcome, group_records, ingest, parse_jsonl,
};

// ── Mock Provider ────────────────────────────────────────────────────────

/// Answers by naming the players whose records it was shown, and embeds
/// text as a character histogram. A follow-up rewrite gets the players
/// mentioned in the conversation prefixed to it.
#[derive(Default)]
struct RecordingProvider {
    requests: Mutex<Vec<ProviderRequest>>,
}

impl RecordingProvider {
    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn last_request(&self) -> ProviderRequest {
        self.requests().pop().expect("no provider calls")
    }
}

const PLAYERS: [&str; 3] = ["Devin Williams", "Lance Lynn", "Brady Singer"];

#[async_trait::async_trait]
impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);

        let text = match prompt.split_once("Follow Up Input: ") {
            Some((history, rest)) => {
                let follow_up = rest.lines().next().unwrap_or_default();
                let named: Vec<&str> = PLAYERS
                    .iter()
                    .copied()
                    .filter(|p| history.contains(p))
                    .collect();
                format!("{}：{follow_up}", named.join("、"))
            }
            None => {
                let seen: Vec<&str> = PLAYERS
                    .iter()
                    .copied()
                    .filter(|p| prompt.contains(&format!("【球員：{p}】")))
                    .collect();
                format!("根據紀錄，{} 的資料如上。", seen.join("、"))
            }
        };

        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 100,
                completion_tokens: 10,
                total_tokens: 110,
            }),
            model,
        })
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let embeddings = request
            .inputs
            .iter()
            .map(|text| {
                let mut v = vec![0.01f32; 32];
                for c in text.chars() {
                    v[c as usize % 32] += 1.0;
                }
                v
            })
            .collect();
        Ok(EmbeddingResponse {
            embeddings,
            model: request.model,
        })
    }
}

const RECORDS: &str = r#"{"player_name": "Devin Williams", "game_date": "2022-04-12", "pitch_name": "Changeup", "release_speed": 84.1, "events": "strikeout"}
{"player_name": "Devin Williams", "game_date": "2022-04-12", "pitch_name": "4-Seam Fastball", "release_speed": 94.7, "events": null}
{"player_name": "Devin Williams", "game_date": "2022-06-03", "pitch_name": "Changeup", "release_speed": 83.9, "events": "field_out"}
{"player_name": "Devin Williams", "game_date": "2022-08-21", "pitch_name": "Changeup", "release_speed": 84.4, "events": "strikeout"}
{"player_name": "Lance Lynn", "game_date": "2022-07-01", "pitch_name": "Cutter", "release_speed": 88.2, "events": "single"}
{"player_name": "Lance Lynn", "game_date": "2022-07-07", "pitch_name": "4-Seam Fastball", "release_speed": 93.5, "events": "strikeout"}
{"player_name": "Brady Singer", "game_date": "2022-05-15", "pitch_name": "Sinker", "release_speed": 92.8, "events": "double"}
"#;

struct Pipeline {
    engine: AnswerEngine,
    provider: Arc<RecordingProvider>,
}

async fn pipeline() -> Pipeline {
    let provider = Arc::new(RecordingProvider::default());

    let store = Arc::new(InMemoryVectorStore::new(ProviderEmbedder::new(
        provider.clone(),
        "sentence-transformers/all-MiniLM-L6-v2",
    )));
    let records = parse_jsonl(RECORDS.as_bytes()).unwrap();
    let report = ingest(store.as_ref(), group_records(&records), 500, false)
        .await
        .unwrap();
    assert_eq!(report.documents, 6);

    let sessions = Arc::new(SessionStore::new(
        Arc::new(SummaryBufferFactory::new(provider.clone(), "mock", 2000)),
        SessionLimits::default(),
    ));
    let engine = AnswerEngine::new(
        provider.clone(),
        Arc::new(InMemoryConnector::new(store)),
        sessions,
        Roster::new(pitchscout_config::default_roster()).unwrap(),
        EngineSettings::default(),
    );

    Pipeline { engine, provider }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_named_pitcher_then_follow_up() {
    let p = pipeline().await;

    let first = p
        .engine
        .answer_detailed("Devin Williams 2022 最常用球種？", "line-user")
        .await
        .unwrap();
    assert_eq!(first.players, ["Devin Williams"]);
    assert!((1..=20).contains(&first.k));
    assert!(!first.answer.trim().is_empty());

    // Generation saw only Devin Williams' games.
    let prompt = p.provider.last_request().messages.last().unwrap().content.clone();
    assert!(prompt.contains("【球員：Devin Williams】【比賽日期：2022-04-12】"));
    assert!(prompt.contains("【球員：Devin Williams】【比賽日期：2022-08-21】"));
    assert!(!prompt.contains("Lance Lynn"));
    assert!(!prompt.contains("Brady Singer"));
    assert!(prompt.contains("pitch name: Changeup"));

    // The follow-up names nobody; the player comes from memory.
    let second = p
        .engine
        .answer_detailed("他的救援成功率？", "line-user")
        .await
        .unwrap();
    assert_eq!(second.players, ["Devin Williams"]);
    assert_eq!(second.switch, SwitchOutcome::Unchanged);
    assert_eq!(second.answer, "根據紀錄，Devin Williams 的資料如上。");

    // The follow-up was rewritten before it reached the answer template.
    let request = p.provider.last_request();
    let prompt = &request.messages.last().unwrap().content;
    assert!(prompt.contains("【問題】\nDevin Williams：他的救援成功率？\n"));

    // Memory survived: the first exchange is in the second request.
    assert!(
        request
            .messages
            .iter()
            .any(|m| m.role == Role::User && m.content == "Devin Williams 2022 最常用球種？")
    );
    assert!(
        request
            .messages
            .iter()
            .any(|m| m.role == Role::Assistant && m.content.contains("Devin Williams"))
    );
}

#[tokio::test]
async fn e2e_switching_pitcher_resets_memory() {
    let p = pipeline().await;

    p.engine
        .answer_detailed("Devin Williams 的變速球？", "u1")
        .await
        .unwrap();
    let report = p
        .engine
        .answer_detailed("那 Lance Lynn 呢？", "u1")
        .await
        .unwrap();

    assert_eq!(report.players, ["Lance Lynn"]);
    assert_eq!(
        report.switch,
        SwitchOutcome::Switched {
            previous: vec!["Devin Williams".to_string()]
        }
    );

    // Only the new prompt went out: no history from the Devin Williams talk.
    let request = p.provider.last_request();
    assert_eq!(request.messages.len(), 1);
    assert!(request.messages[0].content.contains("【球員：Lance Lynn】"));
    assert!(!request.messages[0].content.contains("Devin Williams"));
}

#[tokio::test]
async fn e2e_users_keep_separate_topics() {
    let p = pipeline().await;

    p.engine
        .answer_detailed("Brady Singer 的伸卡球？", "alice")
        .await
        .unwrap();
    p.engine
        .answer_detailed("Lance Lynn 的卡特球？", "bob")
        .await
        .unwrap();

    let alice = p.engine.answer_detailed("球速如何？", "alice").await.unwrap();
    assert_eq!(alice.players, ["Brady Singer"]);
    assert_eq!(alice.switch, SwitchOutcome::Unchanged);

    let bob = p.engine.answer_detailed("球速如何？", "bob").await.unwrap();
    assert_eq!(bob.players, ["Lance Lynn"]);
}

#[tokio::test]
async fn e2e_question_without_pitcher_searches_everything() {
    let p = pipeline().await;

    let report = p
        .engine
        .answer_detailed("哪位投手三振最多？", "u2")
        .await
        .unwrap();
    assert!(report.players.is_empty());

    let prompt = p.provider.last_request().messages.last().unwrap().content.clone();
    for player in PLAYERS {
        assert!(prompt.contains(&format!("【球員：{player}】")), "{player} missing");
    }
}

#[tokio::test]
async fn e2e_reingest_is_skipped_unless_forced() {
    let provider = Arc::new(RecordingProvider::default());
    let store = Arc::new(InMemoryVectorStore::new(ProviderEmbedder::new(
        provider.clone(),
        "mini",
    )));
    let docs = group_records(&parse_jsonl(RECORDS.as_bytes()).unwrap());

    let first = ingest(store.as_ref(), docs.clone(), 4, false).await.unwrap();
    assert_eq!((first.documents, first.batches), (6, 2));

    let again = ingest(store.as_ref(), docs.clone(), 4, false).await.unwrap();
    assert!(again.skipped);

    let forced = ingest(store.as_ref(), docs, 4, true).await.unwrap();
    assert_eq!(forced.documents, 6);

    let connector = InMemoryConnector::new(store);
    let handle = connector.connect().await.unwrap();
    assert_eq!(handle.count().await.unwrap(), 6);
    assert!(provider.requests().is_empty());
}
