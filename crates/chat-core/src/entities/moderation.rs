//! Moderation records - the report queue and the pinned-message slot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;
use crate::error::DomainError;
use crate::events::LogEntry;
use crate::value_objects::{MessageKey, UserId};

/// Key of the single pinned-message slot
pub const PINNED_SLOT: &str = "current";

/// One entry of the moderation queue
///
/// The preview is a snapshot; resolving or deleting the message never
/// rewrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    #[serde(skip)]
    pub key: MessageKey,
    pub message_key: MessageKey,
    pub reporter_id: UserId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub reported_at: DateTime<Utc>,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub author_name: String,
}

impl ReportEntry {
    /// Create a report against `message`
    pub fn new(message: &Message, reporter_id: UserId, preview_len: usize) -> Self {
        Self {
            key: MessageKey::default(),
            message_key: message.key.clone(),
            reporter_id,
            reported_at: Utc::now(),
            preview: message.preview(preview_len),
            author_name: message.author_name.clone(),
        }
    }

    /// Decode a report from a queue entry
    pub fn from_entry(entry: &LogEntry) -> Result<Self, DomainError> {
        let mut report: ReportEntry =
            serde_json::from_value(entry.value.clone()).map_err(|e| DomainError::MalformedEntry {
                key: entry.key.clone(),
                reason: e.to_string(),
            })?;
        report.key = entry.key.clone();
        Ok(report)
    }
}

/// Reference stored in the global pinned slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedRef {
    pub message_key: MessageKey,
    pub preview: String,
    pub author_name: String,
    pub pinned_by: UserId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub pinned_at: DateTime<Utc>,
}

impl PinnedRef {
    /// Pin `message` on behalf of `moderator`
    pub fn new(message: &Message, moderator: UserId, preview_len: usize) -> Self {
        Self {
            message_key: message.key.clone(),
            preview: message.preview(preview_len),
            author_name: message.author_name.clone(),
            pinned_by: moderator,
            pinned_at: Utc::now(),
        }
    }
}
