//! Sync layer error types
//!
//! One error type for the engine and every service, wrapping domain and
//! application errors and adding the failures only this layer produces.

use std::time::Duration;

use chat_common::AppError;
use chat_core::DomainError;

/// Sync layer error type
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Domain rule violation or backend failure
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Application error (elevation, config, cache)
    #[error(transparent)]
    App(#[from] AppError),

    /// Request failed input validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A backend fetch did not complete in time
    #[error("Backend fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The window has not been loaded yet
    #[error("Window is not initialized")]
    NotInitialized,
}

impl SyncError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Get the error code for client alerts and logs
    pub fn error_code(&self) -> &str {
        match self {
            Self::Domain(e) => e.code(),
            Self::App(e) => e.error_code(),
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::NotInitialized => "NOT_INITIALIZED",
        }
    }

    /// Check if retrying later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Domain(e) => e.is_transient(),
            Self::App(e) => e.is_transient(),
            Self::Timeout(_) => true,
            Self::Validation(_) | Self::NotInitialized => false,
        }
    }

    /// Check if the backend rejected a write by policy
    pub fn is_permission(&self) -> bool {
        matches!(self, Self::Domain(e) if e.is_permission())
    }

    /// Check if the request was invalid before reaching the backend
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Domain(e) => e.is_validation(),
            Self::App(AppError::Validation(_)) | Self::Validation(_) => true,
            _ => false,
        }
    }

    /// Check if the caller lacks the right to do this
    pub fn is_authorization(&self) -> bool {
        match self {
            Self::Domain(e) => e.is_authorization(),
            Self::App(AppError::InvalidCredentials) => true,
            _ => false,
        }
    }

    /// Check if an entry or response could not be parsed
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Domain(e) if e.is_malformed())
    }
}

impl From<validator::ValidationErrors> for SyncError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result type alias for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
