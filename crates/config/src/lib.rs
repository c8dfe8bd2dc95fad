//! Configuration loading, validation, and management for PitchScout.
//!
//! Loads configuration from `~/.pitchscout/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.pitchscout/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Known pitchers, "First Last"
    #[serde(default = "default_roster")]
    pub roster: Vec<String>,

    /// Adaptive retrieval sizing
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Answer generation retry policy
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Conversation memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Session lifetime configuration
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Vector store configuration
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.5-pro".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    8192
}

/// The 2022 season roster of USA pitchers at the World Baseball Classic.
pub fn default_roster() -> Vec<String> {
    [
        "Brady Singer",
        "Lance Lynn",
        "Devin Williams",
        "Adam Wainwright",
        "Daniel Bard",
        "Jason Adam",
        "David Bednar",
        "Nick Martinez",
        "Miles Mikolas",
        "Kendall Graveman",
        "Ryan Pressly",
        "Aaron Loup",
        "Kyle Freeland",
        "Adam Ottavino",
        "Merrill Kelly",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("roster", &self.roster)
            .field("retrieval", &self.retrieval)
            .field("generation", &self.generation)
            .field("memory", &self.memory)
            .field("sessions", &self.sessions)
            .field("vector_store", &self.vector_store)
            .field("gateway", &self.gateway)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("public_base_url", &self.public_base_url)
            .field("channel_access_token", &redact(&self.channel_access_token))
            .field("channel_secret", &redact(&self.channel_secret))
            .field("inline_limit_utf16", &self.inline_limit_utf16)
            .field("split_chars", &self.split_chars)
            .field("preview_chars", &self.preview_chars)
            .field("push_max_retries", &self.push_max_retries)
            .field("push_retry_wait_ms", &self.push_retry_wait_ms)
            .field("download_dir", &self.download_dir)
            .field("download_ttl_secs", &self.download_ttl_secs)
            .finish()
    }
}

/// Bounds for the retrieval-width bisection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Token ceiling for retrieved context plus question
    #[serde(default = "default_context_max_tokens")]
    pub max_tokens: usize,

    /// Largest retrieval width
    #[serde(default = "default_max_k")]
    pub max_k: usize,

    /// Smallest retrieval width
    #[serde(default = "default_min_k")]
    pub min_k: usize,
}

fn default_context_max_tokens() -> usize {
    125_000
}
fn default_max_k() -> usize {
    20
}
fn default_min_k() -> usize {
    1
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_context_max_tokens(),
            max_k: default_max_k(),
            min_k: default_min_k(),
        }
    }
}

/// Retry behaviour of the answer generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Wait after a quota-exhausted response
    #[serde(default = "default_quota_cooldown")]
    pub quota_cooldown_secs: u64,

    /// Wait after an empty answer
    #[serde(default = "default_empty_cooldown")]
    pub empty_answer_cooldown_secs: u64,
}

fn default_max_attempts() -> usize {
    9
}
fn default_quota_cooldown() -> u64 {
    61
}
fn default_empty_cooldown() -> u64 {
    3
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            quota_cooldown_secs: default_quota_cooldown(),
            empty_answer_cooldown_secs: default_empty_cooldown(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Buffered history above this many tokens is folded into the summary
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: usize,

    /// How many recent history messages to scan for a player name when the
    /// question names none
    #[serde(default = "default_history_scan")]
    pub history_scan_messages: usize,

    /// Model used for summaries (defaults to `default_model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_model: Option<String>,
}

fn default_summary_max_tokens() -> usize {
    2000
}
fn default_history_scan() -> usize {
    4
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            summary_max_tokens: default_summary_max_tokens(),
            history_scan_messages: default_history_scan(),
            summary_model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Live sessions above this count evict the least recently used
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Sessions idle longer than this are dropped
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,
}

fn default_max_sessions() -> usize {
    1000
}
fn default_idle_ttl() -> u64 {
    24 * 60 * 60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            idle_ttl_secs: default_idle_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// "chroma" or "in_memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Chroma server URL
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Collection holding the pitch-event documents
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Provider used for embeddings (a key of `providers`, or a well-known name)
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Documents per `add` call during ingestion
    #[serde(default = "default_ingest_batch")]
    pub ingest_batch_size: usize,
}

fn default_store_backend() -> String {
    "chroma".into()
}
fn default_store_url() -> String {
    "http://localhost:8000".into()
}
fn default_collection() -> String {
    "wbc_usa_pitchers_2022".into()
}
fn default_embedding_provider() -> String {
    "tei".into()
}
fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".into()
}
fn default_ingest_batch() -> usize {
    500
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: default_store_url(),
            collection: default_collection(),
            embedding_provider: default_embedding_provider(),
            embedding_model: default_embedding_model(),
            ingest_batch_size: default_ingest_batch(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Externally reachable base URL, used for download links
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,

    /// Messaging API channel access token (push messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_access_token: Option<String>,

    /// Messaging API channel secret (webhook signature validation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_secret: Option<String>,

    /// Answers up to this many UTF-16 code units go out as one message
    #[serde(default = "default_inline_limit")]
    pub inline_limit_utf16: usize,

    /// Piece size when re-sending a failed single message
    #[serde(default = "default_split_chars")]
    pub split_chars: usize,

    /// Preview length shown next to a download link
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    #[serde(default = "default_push_retries")]
    pub push_max_retries: u32,

    #[serde(default = "default_push_wait")]
    pub push_retry_wait_ms: u64,

    #[serde(default = "default_download_dir")]
    pub download_dir: String,

    #[serde(default = "default_download_ttl")]
    pub download_ttl_secs: u64,
}

fn default_port() -> u16 {
    5000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_inline_limit() -> usize {
    5000
}
fn default_split_chars() -> usize {
    4000
}
fn default_preview_chars() -> usize {
    1500
}
fn default_push_retries() -> u32 {
    6
}
fn default_push_wait() -> u64 {
    2500
}
fn default_download_dir() -> String {
    std::env::temp_dir()
        .join("pitchscout_downloads")
        .to_string_lossy()
        .into_owned()
}
fn default_download_ttl() -> u64 {
    600
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            public_base_url: None,
            channel_access_token: None,
            channel_secret: None,
            inline_limit_utf16: default_inline_limit(),
            split_chars: default_split_chars(),
            preview_chars: default_preview_chars(),
            push_max_retries: default_push_retries(),
            push_retry_wait_ms: default_push_wait(),
            download_dir: default_download_dir(),
            download_ttl_secs: default_download_ttl(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.pitchscout/config.toml).
    ///
    /// Also checks environment variables:
    /// - `PITCHSCOUT_API_KEY` (highest priority), `GOOGLE_API_KEY`, `OPENAI_API_KEY`
    /// - `PITCHSCOUT_PROVIDER`, `PITCHSCOUT_MODEL`
    /// - `CHROMA_URL`
    /// - `CHANNEL_ACCESS_TOKEN`, `CHANNEL_SECRET`, `PUBLIC_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("PITCHSCOUT_API_KEY")
                .or_else(|| lookup("GOOGLE_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(provider) = lookup("PITCHSCOUT_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("PITCHSCOUT_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = lookup("CHROMA_URL") {
            self.vector_store.url = url;
        }
        if let Some(token) = lookup("CHANNEL_ACCESS_TOKEN") {
            self.gateway.channel_access_token = Some(token);
        }
        if let Some(secret) = lookup("CHANNEL_SECRET") {
            self.gateway.channel_secret = Some(secret);
        }
        if let Some(base) = lookup("PUBLIC_BASE_URL") {
            self.gateway.public_base_url = Some(base.trim_end_matches('/').to_string());
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".pitchscout")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.retrieval.min_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.min_k must be at least 1".into(),
            ));
        }
        if self.retrieval.min_k > self.retrieval.max_k {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.min_k ({}) must not exceed retrieval.max_k ({})",
                self.retrieval.min_k, self.retrieval.max_k
            )));
        }
        if self.retrieval.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.max_tokens must be > 0".into(),
            ));
        }

        if self.generation.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_attempts must be at least 1".into(),
            ));
        }

        if self.sessions.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "sessions.max_sessions must be at least 1".into(),
            ));
        }

        if let Some(bad) = self
            .roster
            .iter()
            .find(|name| name.split_whitespace().count() != 2)
        {
            return Err(ConfigError::ValidationError(format!(
                "roster entry '{bad}' must be exactly 'First Last'"
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Model used for conversation summaries.
    pub fn summary_model(&self) -> &str {
        self.memory
            .summary_model
            .as_deref()
            .unwrap_or(&self.default_model)
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            roster: default_roster(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            memory: MemoryConfig::default(),
            sessions: SessionConfig::default(),
            vector_store: VectorStoreConfig::default(),
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
