//! Error types for the feedback daemon.

use thiserror::Error;

/// Result type alias using the feedback daemon's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for feedback daemon operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The identity authority could not be consulted for this caller
    #[error("Identity unavailable: {0}")]
    IdentityUnavailable(String),

    /// The caller's numeric identity does not map to a local account
    #[error("Identity lookup failed: {0}")]
    IdentityLookupFailed(String),

    /// The external collector could not be launched, timed out, or exited unsuccessfully
    #[error("Worker invocation failed: {0}")]
    WorkerInvocationFailed(String),

    /// The output directory could not be scanned for report artifacts
    #[error("Artifact discovery failed: {0}")]
    ArtifactDiscoveryFailed(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error belongs to caller identity resolution.
    ///
    /// Identity errors are the only ones surfaced synchronously to a caller of
    /// `GenerateReport`.
    pub fn is_identity(&self) -> bool {
        matches!(
            self,
            Error::IdentityUnavailable(_) | Error::IdentityLookupFailed(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
