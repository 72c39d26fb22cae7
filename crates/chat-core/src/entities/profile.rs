//! Profile entity - the local participant's identity

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::UserId;

/// Participant profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_moderator: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    /// Only honoured while `is_moderator` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderator_override: Option<ModeratorOverride>,
}

impl Profile {
    /// Create a new participant profile
    pub fn new(id: UserId, display_name: String) -> Self {
        Self {
            id,
            display_name,
            avatar: None,
            is_moderator: false,
            badge: None,
            moderator_override: None,
        }
    }

    /// Set the avatar reference
    #[must_use]
    pub fn with_avatar(mut self, avatar: Option<String>) -> Self {
        self.avatar = avatar;
        self
    }

    fn active_override(&self) -> Option<&ModeratorOverride> {
        self.moderator_override
            .as_ref()
            .filter(|_| self.is_moderator)
    }

    /// Name snapshotted into outgoing messages
    pub fn effective_name(&self) -> &str {
        self.active_override()
            .and_then(|o| o.nickname.as_deref())
            .unwrap_or(&self.display_name)
    }

    /// Avatar snapshotted into outgoing messages
    pub fn effective_avatar(&self) -> Option<&str> {
        self.active_override()
            .and_then(|o| o.avatar.as_deref())
            .or(self.avatar.as_deref())
    }

    /// Badge snapshotted into outgoing messages
    pub fn effective_badge(&self) -> Option<&str> {
        self.active_override()
            .and_then(|o| o.badge.as_deref())
            .or(self.badge.as_deref())
    }
}

/// Moderator nickname/avatar/badge, synced across devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeratorOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl ModeratorOverride {
    /// Create an override stamped with the current time
    pub fn new(nickname: Option<String>, avatar: Option<String>, badge: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            nickname,
            avatar,
            badge,
            // Stored with millisecond precision; stamp it that way up front
            updated_at: now
                .duration_trunc(TimeDelta::milliseconds(1))
                .unwrap_or(now),
        }
    }

    /// Check if the override changes nothing
    pub fn is_blank(&self) -> bool {
        self.nickname.is_none() && self.avatar.is_none() && self.badge.is_none()
    }
}
