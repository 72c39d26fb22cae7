//! Backend ports - what the sync layer needs from the outside world
//!
//! The domain defines the interfaces; `chat-store` and `chat-sync` provide
//! the adapters. All operations are async and may fail with a transient
//! `BackendUnavailable` or a `PermissionDenied` rejection.

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::Value;

use crate::entities::ModeratorOverride;
use crate::error::DomainError;
use crate::events::{LogEntry, LogEvent};
use crate::value_objects::{LogPath, MessageKey, Patch, UserId};

/// Result type for backend operations
pub type RepoResult<T> = Result<T, DomainError>;

/// Handle identifying one open tail subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// An open tail subscription
///
/// The stream ends once the subscription is cancelled with
/// [`LogBackend::unsubscribe`] or the backend goes away.
pub struct Subscription {
    pub id: SubscriptionId,
    pub events: BoxStream<'static, LogEvent>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ============================================================================
// Log Backend
// ============================================================================

#[async_trait]
pub trait LogBackend: Send + Sync {
    /// Append a value under a fresh sortable key.
    /// The backend stamps `created_at` with its own clock.
    async fn push(&self, path: &LogPath, value: Value) -> RepoResult<MessageKey>;

    /// Up to `limit` entries with key <= `end_key` (the most recent when
    /// `None`), returned in ascending key order
    async fn range_by_key(
        &self,
        path: &LogPath,
        end_key: Option<&MessageKey>,
        limit: usize,
    ) -> RepoResult<Vec<LogEntry>>;

    /// Read a single entry
    async fn get(&self, path: &LogPath, key: &MessageKey) -> RepoResult<Option<Value>>;

    /// Write a whole entry, replacing any previous value
    async fn set(&self, path: &LogPath, key: &MessageKey, value: Value) -> RepoResult<()>;

    /// Apply a partial update to an existing entry
    async fn update(&self, path: &LogPath, key: &MessageKey, patch: &Patch) -> RepoResult<()>;

    /// Apply several partial updates atomically
    async fn update_many(&self, path: &LogPath, updates: &[(MessageKey, Patch)])
        -> RepoResult<()>;

    /// Remove an entry; no-op when absent
    async fn remove(&self, path: &LogPath, key: &MessageKey) -> RepoResult<()>;

    /// Open a tail subscription at or after `from_key`
    async fn subscribe(
        &self,
        path: &LogPath,
        from_key: Option<&MessageKey>,
    ) -> RepoResult<Subscription>;

    /// Cancel a subscription; idempotent
    fn unsubscribe(&self, id: SubscriptionId);
}

// ============================================================================
// Media Uploader
// ============================================================================

#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Upload an attachment and return its public URL
    async fn upload(&self, bytes: Vec<u8>, mime_type: &str, filename: &str)
        -> RepoResult<String>;
}

// ============================================================================
// Profile Cache
// ============================================================================

/// Device-local cache of moderator overrides, used for offline bootstrap
#[async_trait]
pub trait ProfileCache: Send + Sync {
    async fn load(&self, user: &UserId) -> RepoResult<Option<ModeratorOverride>>;

    async fn store(&self, user: &UserId, value: &ModeratorOverride) -> RepoResult<()>;

    async fn clear(&self, user: &UserId) -> RepoResult<()>;
}
