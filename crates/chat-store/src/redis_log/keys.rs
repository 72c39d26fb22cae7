//! Redis key and channel naming.

use chat_core::LogPath;

/// Key layout for one deployment, namespaced by a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisKeys {
    prefix: String,
}

impl RedisKeys {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Hash of key -> JSON value
    #[must_use]
    pub fn entries(&self, path: &LogPath) -> String {
        format!("{}:{}:entries", self.prefix, path.name())
    }

    /// Sorted set of keys, all scored 0 so range queries go by lex order
    #[must_use]
    pub fn index(&self, path: &LogPath) -> String {
        format!("{}:{}:index", self.prefix, path.name())
    }

    /// Pub/sub channel of change events
    #[must_use]
    pub fn events(&self, path: &LogPath) -> String {
        format!("{}:{}:events", self.prefix, path.name())
    }
}
