//! Logical paths inside the log backend

use std::fmt;

/// Path of the main conversation log
pub const MESSAGES_PATH: &str = "messages";
/// Path of the moderation report queue
pub const REPORTS_PATH: &str = "reports";
/// Path of the single pinned-message slot
pub const PINNED_PATH: &str = "pinned";
/// Path of moderator profile overrides, keyed by user id
pub const MODERATOR_PROFILES_PATH: &str = "moderator_profiles";

/// A logical log inside the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogPath {
    /// The conversation itself
    Messages,
    /// Moderation queue of reported messages
    Reports,
    /// Global pinned-message slot
    Pinned,
    /// Cross-device moderator nickname/avatar/badge overrides
    ModeratorProfiles,
    /// Any other path
    Custom(String),
}

impl LogPath {
    /// Create a custom path
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// Get the backend path name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Messages => MESSAGES_PATH,
            Self::Reports => REPORTS_PATH,
            Self::Pinned => PINNED_PATH,
            Self::ModeratorProfiles => MODERATOR_PROFILES_PATH,
            Self::Custom(name) => name,
        }
    }

    /// Parse a path name back to a `LogPath`
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            MESSAGES_PATH => Self::Messages,
            REPORTS_PATH => Self::Reports,
            PINNED_PATH => Self::Pinned,
            MODERATOR_PROFILES_PATH => Self::ModeratorProfiles,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for LogPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
