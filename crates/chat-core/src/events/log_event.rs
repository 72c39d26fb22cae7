//! Log events - change notifications delivered by a tail subscription
//!
//! A subscription delivers one `Added` per existing and future entry at or
//! after its starting key, then `Changed` and `Removed` as entries mutate.
//! Nothing is guaranteed about ordering relative to range fetches.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value_objects::MessageKey;

/// One keyed entry of a log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub key: MessageKey,
    pub value: Value,
}

impl LogEntry {
    /// Create a new entry
    pub fn new(key: impl Into<MessageKey>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Kind of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogEventKind {
    Added,
    Changed,
    Removed,
}

/// Change notification for one entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEvent {
    Added(LogEntry),
    Changed(LogEntry),
    Removed { key: MessageKey },
}

impl LogEvent {
    /// Get the event kind
    pub fn kind(&self) -> LogEventKind {
        match self {
            Self::Added(_) => LogEventKind::Added,
            Self::Changed(_) => LogEventKind::Changed,
            Self::Removed { .. } => LogEventKind::Removed,
        }
    }

    /// Get the key the event refers to
    pub fn key(&self) -> &MessageKey {
        match self {
            Self::Added(entry) | Self::Changed(entry) => &entry.key,
            Self::Removed { key } => key,
        }
    }

    /// Check if a subscription starting at `from` should see this event
    pub fn is_at_or_after(&self, from: Option<&MessageKey>) -> bool {
        match from {
            Some(from) => self.key() >= from,
            None => true,
        }
    }
}
