//! HTTP gateway for PitchScout.
//!
//! Serves the answer engine two ways: a synchronous JSON endpoint and a
//! LINE Messaging API webhook that answers in the background and pushes
//! the result back to the chat. Built on Axum.

pub mod delivery;
pub mod downloads;
pub mod line;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use pitchscout_agent::AnswerEngine;
use pitchscout_config::AppConfig;

use delivery::{DeliveryLimits, deliver_answer};
use downloads::DownloadStore;
use line::{LineClient, WebhookBody, verify_signature};

/// Pushed before the answer so the user knows work has started.
pub const THINKING_NOTICE: &str = "📊 思考分析中，請稍候...";

/// Message text that asks for the roster instead of an answer.
pub const ROSTER_KEYWORD: &str = "名單";

/// Set to `1` by an upstream proxy that already sent the thinking notice.
pub const THINKING_SENT_HEADER: &str = "x-thinking-sent";

pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub engine: Arc<AnswerEngine>,
    pub line: LineClient,
    pub downloads: DownloadStore,
    pub limits: DeliveryLimits,
    /// When set, webhook requests must carry a valid signature.
    pub channel_secret: Option<String>,
}

impl GatewayState {
    pub fn from_config(engine: Arc<AnswerEngine>, config: &AppConfig) -> Self {
        let gw = &config.gateway;
        Self {
            engine,
            line: LineClient::from_config(gw),
            downloads: DownloadStore::new(
                &gw.download_dir,
                Duration::from_secs(gw.download_ttl_secs),
                gw.public_base_url.clone(),
            ),
            limits: DeliveryLimits::from_config(gw),
            channel_secret: gw.channel_secret.clone().filter(|s| !s.is_empty()),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/v1/ask", post(ask_handler))
        .route("/callback", post(callback_handler))
        .route("/download/{id}", get(download_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let engine = Arc::new(pitchscout_agent::build_engine(&config)?);
    if config.gateway.channel_access_token.is_none() {
        warn!("No channel access token: webhook replies cannot be pushed");
    }
    let state = Arc::new(GatewayState::from_config(engine, &config));
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'static str>,
}

async fn home_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        message: Some("PitchScout is running."),
        version: None,
    })
}

async fn health_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        message: None,
        version: Some(env!("CARGO_PKG_VERSION")),
    })
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

async fn ask_handler(
    State(state): State<SharedState>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, StatusCode> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let user_id = payload
        .user_id
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "default".to_string());

    info!(user_id = %user_id, question_len = question.len(), "Ask received");
    let answer = state.engine.answer(question, &user_id).await;
    Ok(Json(AskResponse { answer }))
}

async fn callback_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.channel_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(secret, &body, signature) {
            warn!("Webhook signature mismatch");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let payload: WebhookBody = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Webhook without a usable JSON body");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "status": "no body" })),
            )
                .into_response();
        }
    };

    let thinking_sent = headers
        .get(THINKING_SENT_HEADER)
        .and_then(|v| v.to_str().ok())
        == Some("1");

    for event in &payload.events {
        let Some(question) = event.text() else {
            continue;
        };
        let Some(target) = event.target_id() else {
            warn!("Event without a target id, skipped");
            continue;
        };
        if question.is_empty() {
            continue;
        }

        let state = state.clone();
        let question = question.to_string();
        let target = target.to_string();
        tokio::spawn(async move {
            respond(&state, &question, &target, thinking_sent).await;
        });
    }

    (StatusCode::OK, "OK").into_response()
}

/// Background half of the webhook: answer and push.
async fn respond(state: &GatewayState, question: &str, target: &str, thinking_sent: bool) {
    if question == ROSTER_KEYWORD {
        state.line.push(target, &roster_message(&state.engine)).await;
        return;
    }

    if !thinking_sent {
        state.line.push(target, THINKING_NOTICE).await;
    }

    debug!(to = %target, question, "Answering webhook question");
    let answer = state.engine.answer(question, target).await;
    let delivery = deliver_answer(&state.line, &state.downloads, state.limits, target, &answer).await;
    info!(to = %target, ?delivery, "Webhook answer delivered");
}

fn roster_message(engine: &AnswerEngine) -> String {
    let mut text = String::from("📋 2022 WBC 美國隊投手名單：");
    for name in engine.roster().names() {
        text.push('\n');
        text.push_str(name);
    }
    text
}

async fn download_handler(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let Some(text) = state.downloads.load(&id).await else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let disposition = format!("attachment; filename=\"answer_{id}.txt\"");
    let mut response = text.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockLine, spawn_line};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use base64::Engine as _;
    use hmac::{Hmac, Mac};
    use http_body_util::BodyExt;
    use pitchscout_agent::{EngineSettings, Roster};
    use pitchscout_core::error::{ProviderError, StoreError};
    use pitchscout_core::message::Message;
    use pitchscout_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use pitchscout_core::retrieval::{
        Document, PLAYER_FIELD, RetrievalQuery, StoreConnector, VectorStore,
    };
    use pitchscout_memory::{SessionLimits, SessionStore, SummaryBufferFactory};
    use tower::ServiceExt;

    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let asked = request
                .messages
                .last()
                .map(|m| m.content.contains("Lance Lynn"))
                .unwrap_or(false);
            let text = if asked {
                "Lance Lynn 以卡特球為主。"
            } else {
                "沒有指定球員。"
            };
            Ok(ProviderResponse {
                message: Message::assistant(text),
                usage: None,
                model: request.model,
            })
        }
    }

    struct OneDocStore;

    #[async_trait]
    impl VectorStore for OneDocStore {
        fn name(&self) -> &str {
            "one-doc"
        }

        async fn query(&self, query: &RetrievalQuery) -> Result<Vec<Document>, StoreError> {
            let player = query
                .filter
                .as_ref()
                .and_then(|f| f.values.first().cloned())
                .unwrap_or_default();
            Ok(vec![
                Document::new("d1", format!("【球員：{player}】 pitch name: Cutter"))
                    .with_meta(PLAYER_FIELD, player),
            ])
        }

        async fn count(&self) -> Result<usize, StoreError> {
            Ok(1)
        }
    }

    struct OneDocConnector;

    #[async_trait]
    impl StoreConnector for OneDocConnector {
        fn describe(&self) -> String {
            "one-doc".into()
        }

        async fn connect(&self) -> Result<Arc<dyn VectorStore>, StoreError> {
            Ok(Arc::new(OneDocStore))
        }
    }

    fn engine() -> Arc<AnswerEngine> {
        let provider: Arc<dyn Provider> = Arc::new(EchoProvider);
        let sessions = Arc::new(SessionStore::new(
            Arc::new(SummaryBufferFactory::new(provider.clone(), "test", 2000)),
            SessionLimits::default(),
        ));
        Arc::new(AnswerEngine::new(
            provider,
            Arc::new(OneDocConnector),
            sessions,
            Roster::new(pitchscout_config::default_roster()).unwrap(),
            EngineSettings::default(),
        ))
    }

    struct Harness {
        app: Router,
        line: MockLine,
        state: SharedState,
        _dir: tempfile::TempDir,
    }

    async fn harness(secret: Option<&str>) -> Harness {
        let line = spawn_line().await;
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(GatewayState {
            engine: engine(),
            line: LineClient::new(Some("tok".into()))
                .with_api_base(&line.url)
                .with_retry(6, Duration::from_millis(1)),
            downloads: DownloadStore::new(dir.path(), Duration::from_secs(600), None),
            limits: DeliveryLimits::default(),
            channel_secret: secret.map(str::to_string),
        });
        Harness {
            app: build_router(state.clone()),
            line,
            state,
            _dir: dir,
        }
    }

    fn text_event(user: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "events": [{
                "type": "message",
                "message": { "type": "text", "text": text },
                "source": { "type": "user", "userId": user }
            }]
        })
    }

    fn callback(body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/callback")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let h = harness(None).await;
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = h.app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("\"ok\""));
    }

    #[tokio::test]
    async fn home_endpoint() {
        let h = harness(None).await;
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = h.app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ask_returns_the_answer() {
        let h = harness(None).await;
        let req = Request::builder()
            .method("POST")
            .uri("/v1/ask")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"question":"Lance Lynn 最常用的球種？","user_id":"u1"}"#,
            ))
            .unwrap();
        let response = h.app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["answer"], "Lance Lynn 以卡特球為主。");
        assert_eq!(
            h.state.engine.sessions().last_players("u1"),
            Some(vec!["Lance Lynn".to_string()])
        );
    }

    #[tokio::test]
    async fn ask_rejects_blank_question() {
        let h = harness(None).await;
        let req = Request::builder()
            .method("POST")
            .uri("/v1/ask")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"question":"   "}"#))
            .unwrap();
        let response = h.app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn callback_without_json_is_bad_request() {
        let h = harness(None).await;
        let req = Request::builder()
            .method("POST")
            .uri("/callback")
            .body(Body::from("not json"))
            .unwrap();
        let response = h.app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn callback_pushes_notice_then_answer() {
        let h = harness(None).await;
        let response = h
            .app
            .oneshot(callback(&text_event("U1", "Lance Lynn 最常用的球種？")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let pushes = h.line.wait_for(2).await;
        assert_eq!(pushes[0].to, "U1");
        assert_eq!(pushes[0].text, THINKING_NOTICE);
        assert_eq!(pushes[1].text, "Lance Lynn 以卡特球為主。");
    }

    #[tokio::test]
    async fn thinking_header_skips_notice() {
        let h = harness(None).await;
        let mut req = callback(&text_event("U1", "Lance Lynn 的控球？"));
        req.headers_mut()
            .insert(THINKING_SENT_HEADER, HeaderValue::from_static("1"));
        h.app.oneshot(req).await.unwrap();

        let pushes = h.line.wait_for(1).await;
        assert_eq!(pushes[0].text, "Lance Lynn 以卡特球為主。");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.line.pushes().len(), 1);
    }

    #[tokio::test]
    async fn roster_keyword_lists_pitchers() {
        let h = harness(None).await;
        h.app
            .oneshot(callback(&text_event("U1", ROSTER_KEYWORD)))
            .await
            .unwrap();

        let pushes = h.line.wait_for(1).await;
        assert!(pushes[0].text.contains("Devin Williams"));
        assert!(pushes[0].text.contains("Adam Wainwright"));
        assert!(h.state.engine.sessions().is_empty());
    }

    #[tokio::test]
    async fn events_without_target_or_text_are_skipped() {
        let h = harness(None).await;
        let body = serde_json::json!({
            "events": [
                { "type": "message", "message": { "type": "text", "text": "hi" } },
                { "type": "follow", "source": { "userId": "U1" } },
                { "type": "message", "message": { "type": "image" }, "source": { "userId": "U1" } }
            ]
        });
        let response = h.app.oneshot(callback(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.line.attempts(), 0);
    }

    fn sign(secret: &str, body: &str) -> String {
        let mut mac = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    #[tokio::test]
    async fn signature_is_enforced_when_secret_set() {
        let h = harness(Some("s3cret")).await;
        let body = text_event("U1", "Lance Lynn？").to_string();

        let unsigned = Request::builder()
            .method("POST")
            .uri("/callback")
            .body(Body::from(body.clone()))
            .unwrap();
        let response = h.app.clone().oneshot(unsigned).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let signed = Request::builder()
            .method("POST")
            .uri("/callback")
            .header(SIGNATURE_HEADER, sign("s3cret", &body))
            .body(Body::from(body))
            .unwrap();
        let response = h.app.oneshot(signed).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn download_serves_saved_answer() {
        let h = harness(None).await;
        let id = h.state.downloads.save("完整回答").await.unwrap();

        let req = Request::builder()
            .uri(format!("/download/{id}"))
            .body(Body::empty())
            .unwrap();
        let response = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(disposition, format!("attachment; filename=\"answer_{id}.txt\""));
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        assert_eq!(body_string(response).await, "完整回答");

        let missing = Request::builder()
            .uri(format!("/download/{}", uuid::Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let response = h.app.oneshot(missing).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
