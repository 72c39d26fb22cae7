//! Log backend on Redis.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chat_core::{
    KeyGenerator, LogBackend, LogEntry, LogEvent, LogPath, MessageKey, Patch, RepoResult,
    Subscription, SubscriptionId,
};
use dashmap::DashMap;
use futures::channel::mpsc;
use futures_util::StreamExt;
use serde_json::Value;

use super::keys::RedisKeys;
use super::tail::{pump, TailRegistry};
use crate::pool::{RedisPool, RedisPoolError, RedisResult};
use crate::stamp_created_at;

/// Optimistic transaction retries before giving up
const MAX_WATCH_ATTEMPTS: usize = 8;

/// Log backend shared by every instance pointing at the same Redis
#[derive(Clone)]
pub struct RedisLog {
    pool: RedisPool,
    keys: RedisKeys,
    generator: Arc<KeyGenerator>,
    tails: TailRegistry,
    next_subscription: Arc<AtomicU64>,
}

impl std::fmt::Debug for RedisLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLog")
            .field("keys", &self.keys)
            .field("tails", &self.tails.len())
            .finish()
    }
}

impl RedisLog {
    /// Create a log backend using `prefix` for every key and channel
    #[must_use]
    pub fn new(pool: RedisPool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            keys: RedisKeys::new(prefix),
            generator: Arc::new(KeyGenerator::new()),
            tails: Arc::new(DashMap::new()),
            next_subscription: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of tail pumps still running
    #[must_use]
    pub fn active_tails(&self) -> usize {
        self.tails.len()
    }

    async fn publish(
        &self,
        conn: &mut deadpool_redis::Connection,
        path: &LogPath,
        event: &LogEvent,
    ) -> RedisResult<()> {
        let payload = serde_json::to_string(event)?;
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(self.keys.events(path))
            .arg(payload)
            .query_async(conn)
            .await?;

        tracing::trace!(
            path = %path.name(),
            key = %event.key(),
            receivers,
            "Published change event"
        );
        Ok(())
    }

    async fn write_entry(
        &self,
        path: &LogPath,
        key: &MessageKey,
        value: &Value,
    ) -> RedisResult<bool> {
        let mut conn = self.pool.get().await?;
        let body = serde_json::to_string(value)?;

        let (created,): (i64,) = redis::pipe()
            .atomic()
            .hset(self.keys.entries(path), key.as_str(), body)
            .zadd(self.keys.index(path), key.as_str(), 0)
            .ignore()
            .query_async(&mut conn)
            .await?;

        let entry = LogEntry::new(key.clone(), value.clone());
        let event = if created > 0 {
            LogEvent::Added(entry)
        } else {
            LogEvent::Changed(entry)
        };
        self.publish(&mut conn, path, &event).await?;
        Ok(created > 0)
    }

    /// Fetch values for `keys`, skipping any that vanished in between
    async fn load_entries(
        &self,
        conn: &mut deadpool_redis::Connection,
        path: &LogPath,
        keys: Vec<String>,
    ) -> RedisResult<Vec<LogEntry>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(self.keys.entries(path))
            .arg(&keys)
            .query_async(conn)
            .await?;

        let mut entries = Vec::with_capacity(keys.len());
        for (key, raw) in keys.into_iter().zip(values) {
            let Some(raw) = raw else { continue };
            entries.push(LogEntry::new(key, serde_json::from_str(&raw)?));
        }
        Ok(entries)
    }

    async fn range_desc(
        &self,
        path: &LogPath,
        end_key: Option<&MessageKey>,
        limit: usize,
    ) -> RedisResult<Vec<LogEntry>> {
        let mut conn = self.pool.get().await?;
        let max = end_key.map_or_else(|| "+".to_string(), |key| format!("[{key}"));

        let keys: Vec<String> = redis::cmd("ZREVRANGEBYLEX")
            .arg(self.keys.index(path))
            .arg(max)
            .arg("-")
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query_async(&mut conn)
            .await?;

        let mut entries = self.load_entries(&mut conn, path, keys).await?;
        entries.reverse();
        Ok(entries)
    }

    async fn range_from(
        &self,
        path: &LogPath,
        from_key: Option<&MessageKey>,
    ) -> RedisResult<Vec<LogEntry>> {
        let mut conn = self.pool.get().await?;
        let min = from_key.map_or_else(|| "-".to_string(), |key| format!("[{key}"));

        let keys: Vec<String> = redis::cmd("ZRANGEBYLEX")
            .arg(self.keys.index(path))
            .arg(min)
            .arg("+")
            .query_async(&mut conn)
            .await?;

        self.load_entries(&mut conn, path, keys).await
    }

    /// Read-modify-write several entries under WATCH, retrying on conflict
    async fn patch_entries(
        &self,
        path: &LogPath,
        updates: &[(MessageKey, Patch)],
    ) -> RedisResult<()> {
        let entries_key = self.keys.entries(path);
        let fields: Vec<&str> = updates.iter().map(|(key, _)| key.as_str()).collect();
        let mut conn = self.pool.get().await?;

        for attempt in 1..=MAX_WATCH_ATTEMPTS {
            redis::cmd("WATCH")
                .arg(&entries_key)
                .query_async::<()>(&mut conn)
                .await?;

            let current: Vec<Option<String>> = redis::cmd("HMGET")
                .arg(&entries_key)
                .arg(&fields)
                .query_async(&mut conn)
                .await?;

            let mut patched = Vec::with_capacity(updates.len());
            for ((key, patch), raw) in updates.iter().zip(current) {
                let Some(raw) = raw else {
                    redis::cmd("UNWATCH").query_async::<()>(&mut conn).await?;
                    return Err(RedisPoolError::EntryNotFound {
                        path: path.name().to_string(),
                        key: key.clone(),
                    });
                };
                let mut value: Value = serde_json::from_str(&raw)?;
                patch.apply(&mut value);
                patched.push((key, value));
            }

            let mut pipe = redis::pipe();
            pipe.atomic();
            for (key, value) in &patched {
                pipe.hset(&entries_key, key.as_str(), serde_json::to_string(value)?)
                    .ignore();
            }
            let committed: Option<()> = pipe.query_async(&mut conn).await?;

            if committed.is_some() {
                for (key, value) in patched {
                    let event = LogEvent::Changed(LogEntry::new(key.clone(), value));
                    self.publish(&mut conn, path, &event).await?;
                }
                return Ok(());
            }

            tracing::debug!(path = %path.name(), attempt, "Concurrent write, retrying patch");
        }

        Err(RedisPoolError::Contended(MAX_WATCH_ATTEMPTS))
    }

    async fn delete_entry(&self, path: &LogPath, key: &MessageKey) -> RedisResult<()> {
        let mut conn = self.pool.get().await?;

        let (removed,): (i64,) = redis::pipe()
            .atomic()
            .hdel(self.keys.entries(path), key.as_str())
            .zrem(self.keys.index(path), key.as_str())
            .ignore()
            .query_async(&mut conn)
            .await?;

        if removed > 0 {
            self.publish(&mut conn, path, &LogEvent::Removed { key: key.clone() })
                .await?;
        }
        Ok(())
    }

    async fn open_tail(
        &self,
        path: &LogPath,
        from_key: Option<&MessageKey>,
    ) -> RedisResult<Subscription> {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed) + 1);

        // Listen before taking the snapshot so no write falls in between;
        // an entry seen by both is delivered twice and deduplicated downstream
        let mut pubsub = self.pool.client()?.get_async_pubsub().await?;
        pubsub.subscribe(self.keys.events(path)).await?;
        let snapshot = self.range_from(path, from_key).await?;

        let (tx, rx) = mpsc::unbounded();
        for entry in snapshot {
            let _ = tx.unbounded_send(LogEvent::Added(entry));
        }

        let handle = tokio::spawn(pump(
            id,
            pubsub.into_on_message(),
            from_key.cloned(),
            tx,
            Arc::clone(&self.tails),
        ));
        self.tails.insert(id, handle.abort_handle());

        tracing::debug!(path = %path.name(), subscription = %id, "Tail subscription opened");
        Ok(Subscription {
            id,
            events: rx.boxed(),
        })
    }
}

#[async_trait]
impl LogBackend for RedisLog {
    async fn push(&self, path: &LogPath, mut value: Value) -> RepoResult<MessageKey> {
        let key = self.generator.generate();
        stamp_created_at(&mut value, chrono::Utc::now().timestamp_millis());
        self.write_entry(path, &key, &value).await?;
        Ok(key)
    }

    async fn range_by_key(
        &self,
        path: &LogPath,
        end_key: Option<&MessageKey>,
        limit: usize,
    ) -> RepoResult<Vec<LogEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.range_desc(path, end_key, limit).await?)
    }

    async fn get(&self, path: &LogPath, key: &MessageKey) -> RepoResult<Option<Value>> {
        let mut conn = self.pool.get().await?;
        let raw: Option<String> = redis::cmd("HGET")
            .arg(self.keys.entries(path))
            .arg(key.as_str())
            .query_async(&mut conn)
            .await
            .map_err(RedisPoolError::from)?;

        Ok(raw
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(RedisPoolError::from)?)
    }

    async fn set(&self, path: &LogPath, key: &MessageKey, value: Value) -> RepoResult<()> {
        self.write_entry(path, key, &value).await?;
        Ok(())
    }

    async fn update(&self, path: &LogPath, key: &MessageKey, patch: &Patch) -> RepoResult<()> {
        Ok(self
            .patch_entries(path, &[(key.clone(), patch.clone())])
            .await?)
    }

    async fn update_many(
        &self,
        path: &LogPath,
        updates: &[(MessageKey, Patch)],
    ) -> RepoResult<()> {
        if updates.is_empty() {
            return Ok(());
        }
        Ok(self.patch_entries(path, updates).await?)
    }

    async fn remove(&self, path: &LogPath, key: &MessageKey) -> RepoResult<()> {
        Ok(self.delete_entry(path, key).await?)
    }

    async fn subscribe(
        &self,
        path: &LogPath,
        from_key: Option<&MessageKey>,
    ) -> RepoResult<Subscription> {
        Ok(self.open_tail(path, from_key).await?)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Some((_, handle)) = self.tails.remove(&id) {
            handle.abort();
            tracing::debug!(subscription = %id, "Tail subscription closed");
        }
    }
}
