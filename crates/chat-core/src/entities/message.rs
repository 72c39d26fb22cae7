//! Message entity - one entry of the conversation log

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::profile::Profile;
use super::reaction::ReactionLedger;
use crate::error::DomainError;
use crate::events::LogEntry;
use crate::value_objects::{MessageKey, Patch, UserId};

/// Delivery status of a message
///
/// Only `Sending` (local echo) and `Sent` are ever stored; `Seen` is derived
/// from the `seen_by` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    #[default]
    Sent,
    Seen,
}

/// Kind of attached media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    File,
}

impl MediaKind {
    /// Classify an attachment by MIME type
    pub fn from_mime(mime_type: &str) -> Self {
        let mime_type = mime_type.to_ascii_lowercase();
        if mime_type.starts_with("image/") {
            Self::Image
        } else if mime_type.starts_with("video/") {
            Self::Video
        } else if mime_type.starts_with("audio/") {
            Self::Audio
        } else {
            Self::File
        }
    }

    /// Text shown in previews of media-only messages
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::Image => "[image]",
            Self::Video => "[video]",
            Self::Audio => "[audio]",
            Self::File => "[file]",
        }
    }
}

/// Reference to uploaded media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub url: String,
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl MediaAttachment {
    /// Create an attachment from an upload result
    pub fn new(url: String, mime_type: &str, filename: Option<String>) -> Self {
        Self {
            url,
            kind: MediaKind::from_mime(mime_type),
            filename,
        }
    }
}

/// Denormalized snapshot of the message being replied to
///
/// Never refreshed after creation; it survives edits and deletes of its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub key: MessageKey,
    pub preview: String,
    pub author_name: String,
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Log key; carried by the entry, not the value
    #[serde(skip)]
    pub key: MessageKey,
    pub author_id: UserId,
    pub author_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_avatar: Option<String>,
    #[serde(default)]
    pub author_is_moderator: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_badge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaAttachment>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: DeliveryStatus,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyRef>,
    #[serde(default, skip_serializing_if = "ReactionLedger::is_empty")]
    pub reactions: ReactionLedger,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub seen_by: BTreeMap<UserId, String>,
    /// Correlates a pending local echo with its confirmed entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_nonce: Option<String>,
}

impl Message {
    /// Create a pending message authored by `profile`
    ///
    /// The message carries a client-local key and `Sending` status until the
    /// backend confirms it.
    pub fn draft(profile: &Profile, nonce: String) -> Self {
        Self {
            key: MessageKey::local(&nonce),
            author_id: profile.id.clone(),
            author_name: profile.effective_name().to_string(),
            author_avatar: profile.effective_avatar().map(str::to_string),
            author_is_moderator: profile.is_moderator,
            author_badge: profile.effective_badge().map(str::to_string),
            body: None,
            media: None,
            created_at: Utc::now(),
            status: DeliveryStatus::Sending,
            edited: false,
            deleted: false,
            reply_to: None,
            reactions: ReactionLedger::default(),
            seen_by: BTreeMap::new(),
            local_nonce: Some(nonce),
        }
    }

    /// Set the text body
    #[must_use]
    pub fn with_body(mut self, body: Option<String>) -> Self {
        self.body = body;
        self
    }

    /// Attach media
    #[must_use]
    pub fn with_media(mut self, media: Option<MediaAttachment>) -> Self {
        self.media = media;
        self
    }

    /// Reply to another message
    #[must_use]
    pub fn with_reply(mut self, reply_to: Option<ReplyRef>) -> Self {
        self.reply_to = reply_to;
        self
    }

    /// Decode a message from a log entry
    pub fn from_entry(entry: &LogEntry) -> Result<Self, DomainError> {
        let mut message: Message =
            serde_json::from_value(entry.value.clone()).map_err(|e| DomainError::MalformedEntry {
                key: entry.key.clone(),
                reason: e.to_string(),
            })?;
        message.key = entry.key.clone();
        Ok(message)
    }

    /// Encode the value written to the log
    ///
    /// Pending messages are written as `Sent`; that is the only status marker
    /// ever transmitted.
    pub fn to_value(&self) -> Result<Value, DomainError> {
        let mut wire = self.clone();
        if wire.status == DeliveryStatus::Sending {
            wire.status = DeliveryStatus::Sent;
        }
        serde_json::to_value(&wire).map_err(|e| DomainError::InternalError(e.to_string()))
    }

    /// Check if message has been edited
    #[inline]
    pub fn is_edited(&self) -> bool {
        self.edited
    }

    /// Check if message is a reply
    #[inline]
    pub fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }

    /// Check if message was soft-deleted and only its shell remains
    #[inline]
    pub fn is_shell(&self) -> bool {
        self.deleted
    }

    /// Check if this is an unconfirmed local echo
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == DeliveryStatus::Sending
    }

    /// Check if `user` wrote this message
    #[inline]
    pub fn is_authored_by(&self, user: &UserId) -> bool {
        &self.author_id == user
    }

    /// Body to render; `None` once soft-deleted
    pub fn visible_body(&self) -> Option<&str> {
        if self.deleted {
            None
        } else {
            self.body.as_deref()
        }
    }

    /// Media to render; `None` once soft-deleted
    pub fn visible_media(&self) -> Option<&MediaAttachment> {
        if self.deleted {
            None
        } else {
            self.media.as_ref()
        }
    }

    /// Compute the delivery status
    pub fn delivery_status(&self) -> DeliveryStatus {
        if self.is_pending() {
            DeliveryStatus::Sending
        } else if self.seen_by.keys().any(|reader| reader != &self.author_id) {
            DeliveryStatus::Seen
        } else {
            DeliveryStatus::Sent
        }
    }

    /// Check if `reader` is in the seen set
    #[inline]
    pub fn is_seen_by(&self, reader: &UserId) -> bool {
        self.seen_by.contains_key(reader)
    }

    /// Get a truncated preview of the message (for replies and pins)
    pub fn preview(&self, max_len: usize) -> String {
        if self.deleted {
            return String::new();
        }
        match (self.body.as_deref().map(str::trim), &self.media) {
            (Some(body), _) if !body.is_empty() => truncate(body, max_len).to_string(),
            (_, Some(media)) => media.kind.placeholder().to_string(),
            _ => String::new(),
        }
    }

    /// Build the denormalized reply reference to this message
    pub fn reply_ref(&self, max_len: usize) -> ReplyRef {
        ReplyRef {
            key: self.key.clone(),
            preview: self.preview(max_len),
            author_name: self.author_name.clone(),
        }
    }

    /// Check if the message is still inside the author's edit window
    pub fn within_edit_window(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let age = now.signed_duration_since(self.created_at).num_milliseconds();
        let window = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        age < window
    }

    /// Redact locally, keeping only the shell
    pub fn soft_delete(&mut self) {
        self.deleted = true;
        self.body = None;
        self.media = None;
    }

    // === Patches ===

    /// Patch for an author edit
    pub fn edit_patch(body: &str) -> Patch {
        Patch::new().set("body", body).set("edited", true)
    }

    /// Patch for an author self-delete
    pub fn soft_delete_patch() -> Patch {
        Patch::new()
            .set("deleted", true)
            .remove("body")
            .remove("media")
    }

    /// Patch adding `reader` to the seen set
    pub fn seen_patch(reader: &UserId, display_name: &str) -> Patch {
        Patch::new().set(&format!("seen_by/{reader}"), display_name)
    }

    /// Patch writing one reaction cell
    pub fn reaction_patch(symbol: &str, user: &UserId, present: bool) -> Patch {
        let path = format!("reactions/{symbol}/{user}");
        if present {
            Patch::new().set(&path, true)
        } else {
            Patch::new().remove(&path)
        }
    }
}

/// Truncate on a char boundary
fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        let mut end = max_len;
        while !s.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        &s[..end]
    }
}
