//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// Invalid caller input, rejected before any I/O happens.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The backing document exists but is not valid JSON. The document is
    /// surfaced as-is, never destroyed or overwritten automatically.
    #[error("Profile store corrupted: {0}")]
    StorageCorruption(String),

    /// The scoped lock could not be acquired within the bounded wait.
    /// Retryable.
    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CoreError {
    /// Whether this is expected behavior (caller input, lock contention),
    /// used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error`
    /// when returning `false`.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::ValidationError(_) | Self::LockTimeout(_))
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;
