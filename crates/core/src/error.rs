//! Error types for the PitchScout domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all PitchScout operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Vector store errors ---
    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),

    // --- Conversation memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    /// The provider's request quota is used up. This is the only failure the
    /// answer engine waits out; everything else aborts.
    #[error("Quota exhausted, retry after {retry_after_secs}s")]
    QuotaExhausted { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether this error signals quota exhaustion.
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, Self::QuotaExhausted { .. })
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached or opened during initialization.
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Operation not supported by {backend}: {operation}")]
    Unsupported { backend: String, operation: String },
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 500,
            message: "Internal Server Error".into(),
        });
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("Internal Server Error"));
    }

    #[test]
    fn quota_exhaustion_is_distinguishable() {
        assert!(ProviderError::QuotaExhausted { retry_after_secs: 61 }.is_quota_exhausted());
        assert!(!ProviderError::Network("reset".into()).is_quota_exhausted());
        assert!(
            !ProviderError::ApiError {
                status_code: 429,
                message: "not a quota signal by itself".into(),
            }
            .is_quota_exhausted()
        );
    }

    #[test]
    fn store_error_displays_correctly() {
        let err = Error::Store(StoreError::Unsupported {
            backend: "memory".into(),
            operation: "count".into(),
        });
        assert!(err.to_string().contains("memory"));
        assert!(err.to_string().contains("count"));
    }
}
