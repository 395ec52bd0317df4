//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

/// Toolbox error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum ToolboxError {
    /// Caller input error, rejected before any network traffic.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Network failure (connect, TLS, protocol, unexpected status).
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The remote host did not answer within the bounded wait. Kept apart
    /// from [`Self::NetworkError`] so callers can tell a slow host from an
    /// unreachable one.
    #[error("Timeout: {0}")]
    TimeoutError(String),
}

/// Toolbox Result type alias
pub type ToolboxResult<T> = std::result::Result<T, ToolboxError>;
