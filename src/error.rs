// Error types for hnkit.
// Covers transport failures, HTTP status classification, rate limiting, and payload validation.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors produced by the client, cache, and tree materializer.
///
/// The enum is `Clone` so that every caller awaiting the same in-flight cache
/// load can receive its own copy of a failure.
#[derive(Error, Debug, Clone)]
pub enum HnError {
    #[error("request cancelled")]
    Cancelled,

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("rate limited (HTTP {status}){}", retry_hint(.retry_after))]
    RateLimited {
        status: u16,
        /// Server-provided `Retry-After`, in seconds.
        retry_after: Option<u64>,
    },

    #[error("HTTP {status} still failing after {attempts} attempts")]
    RetriesExhausted { status: u16, attempts: u32 },

    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Arc<reqwest::Error>>,
    },

    #[error("invalid response payload: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(String),
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(", retry after {}s", secs),
        None => String::new(),
    }
}

impl HnError {
    /// Build a transport error that has no underlying `reqwest` error.
    pub fn transport(message: impl Into<String>) -> Self {
        HnError::Transport {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, HnError::Cancelled)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, HnError::Transport { .. })
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            HnError::Status { status, .. }
            | HnError::RateLimited { status, .. }
            | HnError::RetriesExhausted { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// How long the server asked us to wait before trying again.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            HnError::RateLimited {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HnError {
    fn from(err: reqwest::Error) -> Self {
        HnError::Transport {
            message: err.to_string(),
            source: Some(Arc::new(err)),
        }
    }
}

impl From<serde_json::Error> for HnError {
    fn from(err: serde_json::Error) -> Self {
        HnError::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HnError>;
