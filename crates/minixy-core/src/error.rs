//! Error types for minixy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using minixy's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for minixy operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Inference service refused the call because of its rate limit
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Call exceeded its time budget
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input (client-caused)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Request(e.to_string())
        }
    }
}

// =============================================================================
// ROW-LEVEL ENRICHMENT FAILURES
// =============================================================================

/// Classification of a row-level enrichment failure.
///
/// Serialized in upload responses as the `kind` of a failure marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichErrorKind {
    Transport,
    RateLimited,
    Timeout,
    SchemaViolation,
    InvalidRecord,
    Cancelled,
    Internal,
}

/// Failure to enrich a single row.
///
/// Recoverable at batch granularity: the orchestrator records it against the
/// row index and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichError {
    /// Network or protocol failure talking to the inference service.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The inference service rejected the call due to rate limiting.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The call did not complete within its budget.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The service answered, but the answer did not conform to the output schema.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// The enriched row cannot be stored (e.g. a value exceeds its column width).
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The batch was cancelled before this row completed.
    #[error("cancelled")]
    Cancelled,

    /// The enrichment task itself failed (e.g. panicked).
    #[error("internal failure: {0}")]
    Internal(String),
}

impl EnrichError {
    /// The serializable kind of this failure.
    pub fn kind(&self) -> EnrichErrorKind {
        match self {
            Self::Transport(_) => EnrichErrorKind::Transport,
            Self::RateLimited(_) => EnrichErrorKind::RateLimited,
            Self::Timeout(_) => EnrichErrorKind::Timeout,
            Self::SchemaViolation(_) => EnrichErrorKind::SchemaViolation,
            Self::InvalidRecord(_) => EnrichErrorKind::InvalidRecord,
            Self::Cancelled => EnrichErrorKind::Cancelled,
            Self::Internal(_) => EnrichErrorKind::Internal,
        }
    }

    /// Whether a fresh attempt may succeed.
    ///
    /// Schema violations count: the model is sampled again on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RateLimited(_) | Self::Timeout(_) | Self::SchemaViolation(_)
        )
    }
}

impl From<Error> for EnrichError {
    fn from(err: Error) -> Self {
        match err {
            Error::RateLimited(msg) => EnrichError::RateLimited(msg),
            Error::Timeout(msg) => EnrichError::Timeout(msg),
            Error::Serialization(msg) => EnrichError::SchemaViolation(msg),
            Error::Inference(msg) | Error::Request(msg) => EnrichError::Transport(msg),
            Error::Io(e) => EnrichError::Transport(e.to_string()),
            other => EnrichError::Internal(other.to_string()),
        }
    }
}
