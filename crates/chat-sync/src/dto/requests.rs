//! Request DTOs
//!
//! All request DTOs implement `Deserialize` and `Validate` for input validation.

use chat_core::MessageKey;
use serde::Deserialize;
use validator::{Validate, ValidationError};

// ============================================================================
// Profile Requests
// ============================================================================

/// Join the conversation with a display identity
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct JoinRequest {
    #[validate(length(min = 1, max = 32, message = "Display name must be 1-32 characters"))]
    pub display_name: String,

    #[validate(url(message = "Avatar must be a URL"))]
    pub avatar: Option<String>,
}

/// Moderator nickname/avatar/badge override
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct OverrideRequest {
    #[validate(length(min = 1, max = 32, message = "Nickname must be 1-32 characters"))]
    pub nickname: Option<String>,

    #[validate(url(message = "Avatar must be a URL"))]
    pub avatar: Option<String>,

    #[validate(length(min = 1, max = 24, message = "Badge must be 1-24 characters"))]
    pub badge: Option<String>,
}

// ============================================================================
// Message Requests
// ============================================================================

/// Raw attachment to upload before sending
#[derive(Clone, Validate)]
pub struct Attachment {
    pub bytes: Vec<u8>,

    #[validate(length(min = 3, message = "Attachment needs a MIME type"))]
    pub mime_type: String,

    #[validate(length(min = 1, max = 255, message = "Filename must be 1-255 characters"))]
    pub filename: String,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("filename", &self.filename)
            .finish()
    }
}

/// Send a new message
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(max = 2000, message = "Message must be at most 2000 characters"))]
    pub body: Option<String>,

    #[serde(skip)]
    #[validate(nested)]
    pub attachment: Option<Attachment>,

    /// Key of the message being replied to
    pub reply_to: Option<MessageKey>,
}

impl SendMessageRequest {
    /// Text-only message
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    #[must_use]
    pub fn replying_to(mut self, key: MessageKey) -> Self {
        self.reply_to = Some(key);
        self
    }
}

/// Replace the body of an own message
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EditMessageRequest {
    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    pub body: String,
}

// ============================================================================
// Reaction Requests
// ============================================================================

/// Toggle one reaction symbol
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReactionRequest {
    #[validate(
        length(min = 1, max = 16, message = "Reaction must be 1-16 characters"),
        custom(function = "validate_symbol")
    )]
    pub symbol: String,
}

impl ReactionRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }
}

/// Symbols become field names in the stored entry
fn validate_symbol(symbol: &str) -> Result<(), ValidationError> {
    if symbol.chars().any(|c| c.is_whitespace() || "/.#$[]".contains(c)) {
        return Err(ValidationError::new("reaction_symbol"));
    }
    Ok(())
}
