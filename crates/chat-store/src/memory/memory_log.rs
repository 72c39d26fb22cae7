//! In-process log backend.
//!
//! Keeps every path in a sorted map behind one lock and fans change events
//! out to tail subscribers over unbounded channels. Used for local
//! development, single-process deployments, and tests.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chat_core::{
    DomainError, KeyGenerator, LogBackend, LogEntry, LogEvent, LogPath, MessageKey, Patch,
    RepoResult, Subscription, SubscriptionId,
};
use futures::channel::mpsc;
use futures_util::StreamExt;
use parking_lot::RwLock;
use serde_json::Value;

use crate::stamp_created_at;

struct Tail {
    id: SubscriptionId,
    from: Option<MessageKey>,
    tx: mpsc::UnboundedSender<LogEvent>,
}

impl Tail {
    /// `from` bounds which entries count as added; edits and removals of
    /// older entries still reach the subscriber
    fn wants(&self, event: &LogEvent) -> bool {
        match event {
            LogEvent::Added(_) => event.is_at_or_after(self.from.as_ref()),
            LogEvent::Changed(_) | LogEvent::Removed { .. } => true,
        }
    }
}

#[derive(Default)]
struct PathLog {
    entries: BTreeMap<MessageKey, Value>,
    tails: Vec<Tail>,
}

impl PathLog {
    fn notify(&mut self, event: &LogEvent) {
        // Closed receivers are pruned on the way
        self.tails
            .retain(|tail| !tail.wants(event) || tail.tx.unbounded_send(event.clone()).is_ok());
    }
}

/// In-memory log backend
#[derive(Clone, Default)]
pub struct MemoryLog {
    paths: Arc<RwLock<HashMap<String, PathLog>>>,
    keys: Arc<KeyGenerator>,
    next_subscription: Arc<AtomicU64>,
}

impl std::fmt::Debug for MemoryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLog")
            .field("paths", &self.paths.read().len())
            .finish()
    }
}

impl MemoryLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry under a caller-chosen key, without stamping it
    ///
    /// Subscribers see it like any other added entry.
    pub fn seed(&self, path: &LogPath, key: impl Into<MessageKey>, value: Value) {
        let key = key.into();
        let mut paths = self.paths.write();
        let log = paths.entry(path.name().to_string()).or_default();
        let existed = log.entries.insert(key.clone(), value.clone()).is_some();
        let entry = LogEntry::new(key, value);
        log.notify(&if existed {
            LogEvent::Changed(entry)
        } else {
            LogEvent::Added(entry)
        });
    }

    /// Number of entries stored under a path
    #[must_use]
    pub fn len(&self, path: &LogPath) -> usize {
        self.paths
            .read()
            .get(path.name())
            .map_or(0, |log| log.entries.len())
    }

    /// Check if a path holds no entries
    #[must_use]
    pub fn is_empty(&self, path: &LogPath) -> bool {
        self.len(path) == 0
    }

    /// Number of live tail subscriptions on a path
    #[must_use]
    pub fn subscriber_count(&self, path: &LogPath) -> usize {
        let mut paths = self.paths.write();
        paths.get_mut(path.name()).map_or(0, |log| {
            log.tails.retain(|tail| !tail.tx.is_closed());
            log.tails.len()
        })
    }

    /// Snapshot of every entry under a path, ascending
    #[must_use]
    pub fn entries(&self, path: &LogPath) -> Vec<LogEntry> {
        self.paths.read().get(path.name()).map_or_else(Vec::new, |log| {
            log.entries
                .iter()
                .map(|(key, value)| LogEntry::new(key.clone(), value.clone()))
                .collect()
        })
    }

    fn not_found(path: &LogPath, key: &MessageKey) -> DomainError {
        DomainError::EntryNotFound {
            path: path.name().to_string(),
            key: key.clone(),
        }
    }
}

#[async_trait]
impl LogBackend for MemoryLog {
    async fn push(&self, path: &LogPath, mut value: Value) -> RepoResult<MessageKey> {
        let key = self.keys.generate();
        stamp_created_at(&mut value, chrono::Utc::now().timestamp_millis());

        let mut paths = self.paths.write();
        let log = paths.entry(path.name().to_string()).or_default();
        log.entries.insert(key.clone(), value.clone());
        log.notify(&LogEvent::Added(LogEntry::new(key.clone(), value)));

        tracing::trace!(path = %path.name(), key = %key, "Entry pushed");
        Ok(key)
    }

    async fn range_by_key(
        &self,
        path: &LogPath,
        end_key: Option<&MessageKey>,
        limit: usize,
    ) -> RepoResult<Vec<LogEntry>> {
        let paths = self.paths.read();
        let Some(log) = paths.get(path.name()) else {
            return Ok(Vec::new());
        };

        let upper = end_key.map_or(Bound::Unbounded, Bound::Included);
        let mut page: Vec<LogEntry> = log
            .entries
            .range((Bound::Unbounded, upper))
            .rev()
            .take(limit)
            .map(|(key, value)| LogEntry::new(key.clone(), value.clone()))
            .collect();
        page.reverse();
        Ok(page)
    }

    async fn get(&self, path: &LogPath, key: &MessageKey) -> RepoResult<Option<Value>> {
        Ok(self
            .paths
            .read()
            .get(path.name())
            .and_then(|log| log.entries.get(key).cloned()))
    }

    async fn set(&self, path: &LogPath, key: &MessageKey, value: Value) -> RepoResult<()> {
        self.seed(path, key.clone(), value);
        Ok(())
    }

    async fn update(&self, path: &LogPath, key: &MessageKey, patch: &Patch) -> RepoResult<()> {
        let mut paths = self.paths.write();
        let log = paths
            .get_mut(path.name())
            .ok_or_else(|| Self::not_found(path, key))?;
        let value = log
            .entries
            .get_mut(key)
            .ok_or_else(|| Self::not_found(path, key))?;

        patch.apply(value);
        let event = LogEvent::Changed(LogEntry::new(key.clone(), value.clone()));
        log.notify(&event);
        Ok(())
    }

    async fn update_many(
        &self,
        path: &LogPath,
        updates: &[(MessageKey, Patch)],
    ) -> RepoResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut paths = self.paths.write();
        let log = paths
            .get_mut(path.name())
            .ok_or_else(|| Self::not_found(path, &updates[0].0))?;

        // All or nothing: check every key before touching any
        if let Some((missing, _)) = updates
            .iter()
            .find(|(key, _)| !log.entries.contains_key(key))
        {
            return Err(Self::not_found(path, missing));
        }

        let mut events = Vec::with_capacity(updates.len());
        for (key, patch) in updates {
            if let Some(value) = log.entries.get_mut(key) {
                patch.apply(value);
                events.push(LogEvent::Changed(LogEntry::new(key.clone(), value.clone())));
            }
        }
        for event in &events {
            log.notify(event);
        }
        Ok(())
    }

    async fn remove(&self, path: &LogPath, key: &MessageKey) -> RepoResult<()> {
        let mut paths = self.paths.write();
        if let Some(log) = paths.get_mut(path.name()) {
            if log.entries.remove(key).is_some() {
                log.notify(&LogEvent::Removed { key: key.clone() });
            }
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        path: &LogPath,
        from_key: Option<&MessageKey>,
    ) -> RepoResult<Subscription> {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = mpsc::unbounded();

        let mut paths = self.paths.write();
        let log = paths.entry(path.name().to_string()).or_default();

        // Replay under the same lock so nothing slips between snapshot and tail
        let lower = from_key.map_or(Bound::Unbounded, Bound::Included);
        for (key, value) in log.entries.range((lower, Bound::Unbounded)) {
            let _ = tx.unbounded_send(LogEvent::Added(LogEntry::new(key.clone(), value.clone())));
        }

        log.tails.push(Tail {
            id,
            from: from_key.cloned(),
            tx,
        });

        tracing::debug!(path = %path.name(), subscription = %id, "Tail subscription opened");
        Ok(Subscription {
            id,
            events: rx.boxed(),
        })
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut paths = self.paths.write();
        for log in paths.values_mut() {
            log.tails.retain(|tail| tail.id != id);
        }
    }
}
