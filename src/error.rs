//! Error types for Quarry
//!
//! All modules use `QuarryResult<T>` as their return type. The HTTP layer
//! maps variants onto status codes, so the kinds here stay distinguishable:
//! bad input, missing data, upstream trouble, local I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Quarry operations
pub type QuarryResult<T> = Result<T, QuarryError>;

/// All errors that can occur in Quarry
#[derive(Error, Debug)]
pub enum QuarryError {
    // Input validation errors
    #[error("invalid path: {0}")]
    BadPath(String),

    #[error("not found: {0}")]
    NotFound(PathBuf),

    // Remote errors
    #[error("{context}: upstream returned {status}: {body}")]
    UpstreamStatus {
        context: String,
        status: u16,
        body: String,
    },

    #[error("{context}: {reason}")]
    UpstreamInvalid { context: String, reason: String },

    #[error("{context}: {source}")]
    Network {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuarryError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error with context
    pub fn network(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            context: context.into(),
            source,
        }
    }

    /// Whether this error came from the remote side rather than local state.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamStatus { .. } | Self::UpstreamInvalid { .. } | Self::Network { .. }
        )
    }
}
