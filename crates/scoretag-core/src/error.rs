//! Error types for scoretag.
//!
//! Most conditions in the analysis pipeline degrade instead of failing
//! (missing hashes, cache tier misses, unresolved labels, thin provenance).
//! The variants here cover the failures that do propagate, plus the
//! infrastructure errors the stores and HTTP adapters surface internally.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the scoretag library.
#[derive(Debug, Error)]
pub enum ScoretagError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Remote service {service} returned status {status}: {message}")]
    RemoteStatus {
        service: String,
        status: u16,
        message: String,
    },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Pipeline errors
    #[error("Commit conflict for {identity}: {message}")]
    CommitConflict { identity: String, message: String },

    #[error("Classifier failed: {message}")]
    Classifier { message: String },

    #[error("Term generation failed: {message}")]
    Generation { message: String },

    // Vocabulary errors
    #[error("Vocabulary error in category {category}: {message}")]
    Vocabulary { category: String, message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for scoretag operations.
pub type Result<T> = std::result::Result<T, ScoretagError>;

impl From<std::io::Error> for ScoretagError {
    fn from(err: std::io::Error) -> Self {
        ScoretagError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ScoretagError {
    fn from(err: serde_json::Error) -> Self {
        ScoretagError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for ScoretagError {
    fn from(err: rusqlite::Error) -> Self {
        ScoretagError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for ScoretagError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // The configured duration is not recoverable from reqwest's error.
            ScoretagError::Timeout(crate::config::NetworkConfig::REQUEST_TIMEOUT)
        } else {
            ScoretagError::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl ScoretagError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ScoretagError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a database error for a poisoned or unavailable connection lock.
    pub(crate) fn lock_poisoned() -> Self {
        ScoretagError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        }
    }

    /// Check if this error should trigger a retry.
    ///
    /// 5xx and 429 responses are retryable; other statuses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScoretagError::Network { .. } | ScoretagError::Timeout(_) => true,
            ScoretagError::RemoteStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether this error is a commit conflict, the one per-asset failure
    /// surfaced to callers.
    pub fn is_commit_conflict(&self) -> bool {
        matches!(self, ScoretagError::CommitConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScoretagError::CommitConflict {
            identity: "fp:abc123".into(),
            message: "UNIQUE constraint failed: analysis_records.fingerprint".into(),
        };
        assert_eq!(
            err.to_string(),
            "Commit conflict for fp:abc123: UNIQUE constraint failed: analysis_records.fingerprint"
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ScoretagError::Timeout(std::time::Duration::from_secs(5)).is_retryable());
        assert!(ScoretagError::RemoteStatus {
            service: "classifier".into(),
            status: 503,
            message: "busy".into(),
        }
        .is_retryable());
        assert!(!ScoretagError::RemoteStatus {
            service: "classifier".into(),
            status: 400,
            message: "bad request".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_commit_conflict_predicate() {
        assert!(ScoretagError::CommitConflict {
            identity: "name:cue.wav".into(),
            message: "x".into(),
        }
        .is_commit_conflict());
        assert!(!ScoretagError::Other("x".into()).is_commit_conflict());
    }
}
