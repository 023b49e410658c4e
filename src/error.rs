//! Error types for pagescout.

use thiserror::Error;

/// Result type alias using pagescout's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during scan, validation or coordination.
#[derive(Error, Debug)]
pub enum Error {
    /// A detector raised during a scan pass; the scan continues without it.
    #[error("detector '{name}' failed: {message}")]
    DetectorFault { name: String, message: String },

    /// A detector exceeded its configured time budget.
    #[error("detector '{name}' timed out after {duration_ms}ms")]
    Timeout { name: String, duration_ms: u64 },

    /// Network validation or multi-document fetch failed.
    #[error("network error: {0}")]
    Network(String),

    /// The supplied URL could not be resolved to an absolute form.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A CSS selector failed the length/nesting security checks.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Resource exhaustion (memory pressure, dedup cache full, etc).
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The message coordinator has no registered handler for a message type.
    #[error("no handler for {0}")]
    NoHandler(String),

    /// Internal error that should not normally surface.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn detector_fault(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DetectorFault {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn timeout(name: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            name: name.into(),
            duration_ms,
        }
    }

    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl(url.into())
    }

    pub fn invalid_selector(reason: impl Into<String>) -> Self {
        Self::InvalidSelector(reason.into())
    }

    pub fn no_handler(message_type: impl Into<String>) -> Self {
        Self::NoHandler(message_type.into())
    }
}
