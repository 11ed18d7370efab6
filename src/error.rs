//! mcqforge error types

use std::path::PathBuf;

/// mcqforge error types
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    // Endpoint/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Retry ceiling exhausted. The orchestrator treats this as permanent
    /// for the unit that issued the request.
    #[error("generation unavailable after {attempts} attempts: {reason}")]
    GenerationUnavailable { attempts: u32, reason: String },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Storage errors
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cache entry {path}: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A unit's state machine was driven with an event its current phase
    /// does not accept.
    #[error("invalid transition: {event} in phase {phase}")]
    InvalidTransition {
        phase: &'static str,
        event: &'static str,
    },
}

impl ForgeError {
    /// Whether a retry of the same request could plausibly succeed.
    ///
    /// Connection failures, timeouts, rate limiting and 5xx responses are
    /// transient. Everything else (bad model name, malformed response,
    /// configuration) fails the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Connection(_) | Self::Timeout(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the failing call got far enough to produce a meaningful
    /// latency sample (the endpoint answered, just not successfully).
    pub(crate) fn has_response(&self) -> bool {
        matches!(self, Self::Api { .. } | Self::ModelNotFound(_))
    }

    /// Attach a path to an I/O error.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for ForgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ForgeError::Timeout(err.to_string())
        } else if err.is_connect() {
            ForgeError::Connection(err.to_string())
        } else if err.is_decode() {
            ForgeError::InvalidInput(format!("undecodable response body: {err}"))
        } else {
            ForgeError::Http(err.to_string())
        }
    }
}

/// Result type alias for mcqforge operations
pub type Result<T> = std::result::Result<T, ForgeError>;
