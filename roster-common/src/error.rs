//! Common error types for the roster

use thiserror::Error;

/// Common result type for roster operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the roster crates
///
/// "Not found" is never an error here: absent identities, failed credential
/// matches and empty filter results are represented as `None`/empty values.
#[derive(Error, Debug)]
pub enum Error {
    /// Live feed or snapshot could not be fetched or parsed
    #[error("Source unavailable ({source_name}): {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// A single raw record could not be used (skipped by the merger)
    #[error("Malformed record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    /// Same identity seen twice in one source batch; the later record wins
    /// and this is only ever logged
    #[error("Identity collision for {identity}; last record wins")]
    IdentityCollision { identity: String },

    /// Neither the live feed nor the snapshot could be obtained
    #[error("Reconciliation unavailable: live feed ({live}); snapshot ({snapshot})")]
    ReconciliationUnavailable { live: String, snapshot: String },

    /// Login code too short or otherwise unusable
    #[error("Invalid credential input: {0}")]
    InvalidCredentialInput(String),

    /// Durable write of the override store failed
    #[error("Persistence write failure: {0}")]
    PersistenceWriteFailure(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Build a `SourceUnavailable` error for the named source
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Error::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}
