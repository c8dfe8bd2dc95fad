//! LINE Messaging API: webhook payloads, signature checks, push client.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use pitchscout_config::GatewayConfig;
use pitchscout_providers::retry::{RetryOutcome, RetryPolicy, Verdict, retry};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://api.line.me";

type HmacSha256 = Hmac<Sha256>;

/// Check an `X-Line-Signature` header: base64 of the HMAC-SHA256 of the raw
/// request body keyed with the channel secret. Comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(provided) = BASE64.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

/// Length as LINE counts it: UTF-16 code units.
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Split into pieces of at most `max_chars` characters.
pub fn split_chars(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}

// --- Webhook payload ---

#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: Option<EventMessage>,
    #[serde(default)]
    pub source: Option<EventSource>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub room_id: Option<String>,
}

impl WebhookEvent {
    /// Trimmed text of a text-message event.
    pub fn text(&self) -> Option<&str> {
        if self.kind != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.kind != "text" {
            return None;
        }
        Some(message.text.as_deref().unwrap_or_default().trim())
    }

    /// Where replies go: the user, else the group, else the room.
    pub fn target_id(&self) -> Option<&str> {
        let source = self.source.as_ref()?;
        [&source.user_id, &source.group_id, &source.room_id]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|id| !id.is_empty())
    }
}

// --- Push client ---

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Push rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Push failed ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("Push transport error: {0}")]
    Transport(String),

    #[error("No channel access token configured")]
    NoToken,
}

impl PushError {
    /// 4xx responses will not succeed on a resend.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::NoToken)
    }
}

pub struct LineClient {
    http: reqwest::Client,
    api_base: String,
    access_token: Option<String>,
    policy: RetryPolicy,
    wait: Duration,
}

impl LineClient {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.into(),
            access_token,
            policy: RetryPolicy::new(6),
            wait: Duration::from_millis(2500),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.channel_access_token.clone()).with_retry(
            config.push_max_retries as usize,
            Duration::from_millis(config.push_retry_wait_ms),
        )
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, max_attempts: usize, wait: Duration) -> Self {
        self.policy = RetryPolicy::new(max_attempts);
        self.wait = wait;
        self
    }

    /// One push attempt.
    pub async fn push_once(&self, to: &str, text: &str) -> Result<(), PushError> {
        let token = self.access_token.as_deref().ok_or(PushError::NoToken)?;
        let body = serde_json::json!({
            "to": to,
            "messages": [{ "type": "text", "text": text }],
        });

        let response = self
            .http
            .post(format!("{}/v2/bot/message/push", self.api_base))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(PushError::Rejected {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(PushError::Server {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Push a text message, retrying transient failures. Returns whether it
    /// was delivered.
    pub async fn push(&self, to: &str, text: &str) -> bool {
        if to.is_empty() {
            warn!("Skipping push with empty target");
            return false;
        }

        let wait = self.wait;
        let outcome = retry(
            self.policy,
            |result: &Result<(), PushError>| match result {
                Ok(()) => Verdict::Accept,
                Err(e) if e.is_client_error() => Verdict::Abort,
                Err(_) => Verdict::Retry {
                    cooldown: wait,
                    reason: "push failed",
                },
            },
            |attempt| async move {
                let result = self.push_once(to, text).await;
                if let Err(e) = &result {
                    debug!(attempt = attempt + 1, error = %e, "Push attempt failed");
                }
                result
            },
        )
        .await;

        match outcome {
            RetryOutcome::Succeeded { attempts, .. } => {
                info!(to, chars = text.chars().count(), attempts, "Push delivered");
                true
            }
            RetryOutcome::Aborted { error, attempts } => {
                warn!(to, attempts, error = %error, "Push rejected, not retrying");
                false
            }
            RetryOutcome::Exhausted { attempts } => {
                warn!(to, attempts, "Push still failing after retries");
                false
            }
        }
    }
}
