//! Message window - the locally held, ordered slice of the conversation
//!
//! Confirmed messages are kept in a map ordered by key, so the window is
//! always sorted and never holds a key twice. Pending local echoes live in a
//! separate list and render after every confirmed message.

use std::collections::{BTreeMap, HashSet};

use chat_core::{Message, MessageKey};

/// Change notification for renderers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowChange {
    /// The whole window was replaced by an initial load
    Reset { len: usize },
    /// A live entry was inserted
    Appended { key: MessageKey },
    /// Older entries were merged in front of the cursor
    Prepended { count: usize, oldest: MessageKey },
    /// A stored message was replaced by its latest value
    Changed { key: MessageKey },
    /// A message was hard-deleted
    Removed { key: MessageKey },
    /// An optimistic echo was shown
    PendingAdded { nonce: String },
    /// An optimistic echo was withdrawn (confirmed or failed)
    PendingDropped { nonce: String },
}

/// Ordered, deduplicated window over the log
#[derive(Debug, Clone, Default)]
pub struct MessageWindow {
    entries: BTreeMap<MessageKey, Message>,
    pending: Vec<Message>,
}

impl MessageWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every confirmed message; pending echoes survive
    pub fn reset(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.entries = messages
            .into_iter()
            .map(|message| (message.key.clone(), message))
            .collect();
    }

    pub fn contains(&self, key: &MessageKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &MessageKey) -> Option<&Message> {
        self.entries.get(key)
    }

    /// Insert a confirmed message unless its key is already held
    pub fn insert(&mut self, message: Message) -> bool {
        if self.entries.contains_key(&message.key) {
            return false;
        }
        self.entries.insert(message.key.clone(), message);
        true
    }

    /// Replace a held message; unknown keys are ignored
    pub fn replace(&mut self, message: Message) -> bool {
        match self.entries.get_mut(&message.key) {
            Some(slot) => {
                *slot = message;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &MessageKey) -> Option<Message> {
        self.entries.remove(key)
    }

    /// Merge a page of older messages in front of `boundary`
    ///
    /// Only keys strictly older than the boundary are taken, and none that
    /// are already held. Returns how many were added.
    pub fn prepend(
        &mut self,
        boundary: &MessageKey,
        messages: impl IntoIterator<Item = Message>,
    ) -> usize {
        let mut added = 0;
        for message in messages {
            if message.key < *boundary && self.insert(message) {
                added += 1;
            }
        }
        added
    }

    /// Oldest held key
    pub fn oldest_key(&self) -> Option<&MessageKey> {
        self.entries.keys().next()
    }

    pub fn newest_key(&self) -> Option<&MessageKey> {
        self.entries.keys().next_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Confirmed keys, ascending
    pub fn keys(&self) -> impl Iterator<Item = &MessageKey> {
        self.entries.keys()
    }

    /// Confirmed messages, ascending
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.values()
    }

    pub fn pending(&self) -> &[Message] {
        &self.pending
    }

    /// Show an optimistic echo
    pub fn push_pending(&mut self, message: Message) {
        self.pending.push(message);
    }

    /// Withdraw the echo carrying `nonce`
    pub fn drop_pending(&mut self, nonce: &str) -> Option<Message> {
        let index = self
            .pending
            .iter()
            .position(|message| message.local_nonce.as_deref() == Some(nonce))?;
        Some(self.pending.remove(index))
    }

    /// Drop every echo whose confirmed entry is already held
    ///
    /// Returns the nonces that were withdrawn.
    pub fn reconcile_pending(&mut self) -> Vec<String> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let confirmed: HashSet<&str> = self
            .entries
            .values()
            .filter_map(|message| message.local_nonce.as_deref())
            .collect();

        let mut withdrawn = Vec::new();
        self.pending.retain(|echo| match echo.local_nonce.as_deref() {
            Some(nonce) if confirmed.contains(nonce) => {
                withdrawn.push(nonce.to_string());
                false
            }
            _ => true,
        });
        withdrawn
    }

    /// Everything a renderer draws: confirmed messages, then pending echoes
    pub fn render_order(&self) -> impl Iterator<Item = &Message> {
        self.entries.values().chain(self.pending.iter())
    }
}
