use thiserror::Error;

/// Top-level error type for the Concierge chat runtime.
#[derive(Debug, Error)]
pub enum ConciergeError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no session selected")]
    NoSessionSelected,

    #[error("caller is not privileged to perform this action")]
    NotPrivileged,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid widget state: {0}")]
    InvalidState(String),

    #[error("version conflict on '{key}': expected {expected}, found {actual}")]
    VersionConflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("malformed entry under '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage error: {0}")]
    Storage(String),

    /// Another connection holds the write lock. Safe to retry.
    #[error("store busy: {0}")]
    StoreBusy(String),

    #[error("responder error: {0}")]
    Responder(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConciergeError {
    /// Shorthand for a boundary validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ConciergeError>;
