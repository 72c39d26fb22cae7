//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::MessageKey;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Message not found: {0}")]
    MessageNotFound(MessageKey),

    #[error("Entry not found: {path}/{key}")]
    EntryNotFound { path: String, key: MessageKey },

    #[error("No local profile (join first)")]
    ProfileNotFound,

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Message has neither text nor attachment")]
    EmptyMessage,

    #[error("Content too long: max {max} characters")]
    ContentTooLong { max: usize },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    #[error("Not message author")]
    NotMessageAuthor,

    #[error("Moderator privileges required")]
    NotModerator,

    #[error("Edit window has expired")]
    EditWindowExpired,

    #[error("Invalid moderator passphrase")]
    InvalidPassphrase,

    #[error("Write rejected by backend: {0}")]
    PermissionDenied(String),

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    #[error("Session is closed")]
    SessionClosed,

    // =========================================================================
    // Data Errors
    // =========================================================================
    #[error("Malformed entry {key}: {reason}")]
    MalformedEntry { key: MessageKey, reason: String },

    #[error("Malformed upload response: {0}")]
    MalformedUploadResponse(String),

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Get an error code string for client alerts and logs
    pub fn code(&self) -> &'static str {
        match self {
            // Not Found
            Self::MessageNotFound(_) => "UNKNOWN_MESSAGE",
            Self::EntryNotFound { .. } => "UNKNOWN_ENTRY",
            Self::ProfileNotFound => "UNKNOWN_PROFILE",

            // Validation
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::EmptyMessage => "EMPTY_MESSAGE",
            Self::ContentTooLong { .. } => "CONTENT_TOO_LONG",
            Self::InvalidKey(_) => "INVALID_KEY",

            // Authorization
            Self::NotMessageAuthor => "NOT_MESSAGE_AUTHOR",
            Self::NotModerator => "NOT_MODERATOR",
            Self::EditWindowExpired => "EDIT_WINDOW_EXPIRED",
            Self::InvalidPassphrase => "INVALID_PASSPHRASE",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",

            // Lifecycle
            Self::SessionClosed => "SESSION_CLOSED",

            // Data
            Self::MalformedEntry { .. } => "MALFORMED_ENTRY",
            Self::MalformedUploadResponse(_) => "MALFORMED_UPLOAD_RESPONSE",

            // Infrastructure
            Self::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            Self::UploadFailed(_) => "UPLOAD_FAILED",
            Self::CacheError(_) => "CACHE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::MessageNotFound(_) | Self::EntryNotFound { .. } | Self::ProfileNotFound
        )
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_)
                | Self::EmptyMessage
                | Self::ContentTooLong { .. }
                | Self::InvalidKey(_)
        )
    }

    /// Check if this is an authorization error (local gate or backend rejection)
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Self::NotMessageAuthor
                | Self::NotModerator
                | Self::EditWindowExpired
                | Self::InvalidPassphrase
                | Self::PermissionDenied(_)
        )
    }

    /// Check if the backend rejected the write by policy
    pub fn is_permission(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    /// Check if this is a transient availability failure
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_) | Self::UploadFailed(_) | Self::CacheError(_)
        )
    }

    /// Check if a response or entry could not be parsed
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::MalformedEntry { .. } | Self::MalformedUploadResponse(_)
        )
    }
}
