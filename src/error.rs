//! Error types for merge-warden
//!
//! Platform failures are classified at the client boundary so the
//! orchestrator can route them without inspecting raw HTTP responses.

use thiserror::Error;

/// Errors produced by merge-warden
#[derive(Debug, Error)]
pub enum Error {
    /// Input could not be parsed as a pull request URL or canonical key
    #[error("invalid pull request reference '{input}': {reason}")]
    InvalidReference {
        /// The rejected input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Network failure, timeout, rate limit or 5xx (safe to retry the whole cycle)
    #[error("transient platform error: {0}")]
    Transient(String),

    /// The platform rejected the merge because the head changed or conflicts exist
    #[error("merge conflict: {0}")]
    Conflict(String),

    /// The platform's own mergeability flag is false
    #[error("pull request is not mergeable: {0}")]
    NotMergeable(String),

    /// Branch protection or repository policy forbids the operation
    #[error("operation not allowed: {0}")]
    NotAllowed(String),

    /// Credentials lack the required permission
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The pull request or branch does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The conflict task could not be created in the external task system
    #[error("conflict delegation failed: {0}")]
    DelegationFailed(String),

    /// Platform error that fits no other classification
    #[error("platform error: {0}")]
    Platform(String),

    /// Exclusion registry could not be read or written
    #[error("registry error: {0}")]
    Registry(String),

    /// Configuration file is missing fields or malformed
    #[error("configuration error: {0}")]
    Config(String),

    /// No usable authentication token
    #[error("authentication error: {0}")]
    Auth(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error is a conflict-class failure that counts toward exclusion
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::NotMergeable(_))
    }

    /// Whether the error leaves all state untouched and the cycle may be retried later
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Platform(format!("unexpected response body: {err}"));
        }
        // Connection failures and timeouts carry no status and are safe to retry
        Self::Transient(err.to_string())
    }
}

/// Result type alias for merge-warden
pub type Result<T> = std::result::Result<T, Error>;
