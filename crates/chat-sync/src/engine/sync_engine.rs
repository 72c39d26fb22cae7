//! Window synchronization over one log path.

use std::sync::{Arc, Weak};

use chat_common::SyncConfig;
use chat_core::{LogEntry, LogEvent, LogPath, Message, MessageKey, SubscriptionId};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use super::viewport::{CompensatedPage, ScrollCompensation, Viewport};
use crate::error::{SyncError, SyncResult};
use crate::services::delivery::seen_batch;
use crate::session::Session;
use crate::window::{MessageWindow, WindowChange};

/// Buffered change notifications per renderer before it starts lagging
const CHANGE_CAPACITY: usize = 256;

/// Result of one backward pagination request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Older messages were merged and the cursor moved to `oldest`
    Loaded {
        count: usize,
        oldest: MessageKey,
        reached_start: bool,
    },
    /// Nothing lies beyond the cursor
    Exhausted,
    /// Another page is already loading; this call did nothing
    InFlight,
    /// The engine was detached while the page was loading
    Discarded,
}

impl PageOutcome {
    pub fn loaded_count(&self) -> usize {
        match self {
            Self::Loaded { count, .. } => *count,
            _ => 0,
        }
    }
}

struct Tail {
    id: SubscriptionId,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct EngineState {
    window: MessageWindow,
    cursor: Option<MessageKey>,
    initialized: bool,
    in_flight: bool,
    exhausted: bool,
    epoch: u64,
    tail: Option<Tail>,
    focused: bool,
    unread: usize,
}

/// What the pump should do after an event was applied
enum Applied {
    Stale,
    Quiet,
    MarkVisible,
}

struct EngineInner {
    session: Arc<Session>,
    path: LogPath,
    config: SyncConfig,
    state: Mutex<EngineState>,
    changes: broadcast::Sender<WindowChange>,
}

/// Sync engine for one conversation
///
/// Cheap to clone; clones share the same window and subscription.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SyncEngine")
            .field("path", &self.inner.path)
            .field("len", &state.window.len())
            .field("cursor", &state.cursor)
            .field("in_flight", &state.in_flight)
            .field("epoch", &state.epoch)
            .finish()
    }
}

impl SyncEngine {
    /// Engine over the main message log
    pub fn new(session: Arc<Session>, config: SyncConfig) -> Self {
        Self::with_path(session, LogPath::Messages, config)
    }

    pub fn with_path(session: Arc<Session>, path: LogPath, config: SyncConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            inner: Arc::new(EngineInner {
                session,
                path,
                config,
                state: Mutex::new(EngineState::default()),
                changes,
            }),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    pub fn path(&self) -> &LogPath {
        &self.inner.path
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Load the most recent `window_size` messages and start tailing
    ///
    /// Any previous subscription is detached first. Returns the number of
    /// messages loaded, or zero if a later call superseded this one.
    #[instrument(skip(self), fields(path = %self.inner.path.name()))]
    pub async fn initialize(&self, window_size: usize) -> SyncResult<usize> {
        let epoch = self.inner.detach();

        let entries = self.inner.fetch(None, window_size).await?;
        let messages = decode_all(entries);

        let (len, newest, confirmed) = {
            let mut state = self.inner.state.lock();
            if state.epoch != epoch {
                debug!("Initial fetch superseded, discarding");
                return Ok(0);
            }
            state.window.reset(messages);
            state.cursor = state.window.oldest_key().cloned();
            state.initialized = true;
            state.exhausted = false;
            state.unread = 0;
            (
                state.window.len(),
                state.window.newest_key().cloned(),
                state.window.reconcile_pending(),
            )
        };
        self.inner.notify(WindowChange::Reset { len });
        self.inner.notify_confirmed(confirmed);

        let subscription = self
            .inner
            .session
            .subscribe(&self.inner.path, newest.as_ref())
            .await?;

        let focused = {
            let mut state = self.inner.state.lock();
            if state.epoch != epoch {
                drop(state);
                self.inner.session.unsubscribe(subscription.id);
                debug!("Subscription superseded, released");
                return Ok(0);
            }
            let task = tokio::spawn(pump(
                Arc::downgrade(&self.inner),
                epoch,
                subscription.events,
            ));
            state.tail = Some(Tail {
                id: subscription.id,
                task,
            });
            state.focused
        };

        info!(
            loaded = len,
            newest = ?newest,
            subscription = %subscription.id,
            "Window initialized"
        );

        if focused {
            if let Err(e) = self.inner.mark_visible().await {
                warn!(error = %e, "Could not mark initial window as seen");
            }
        }
        Ok(len)
    }

    /// Load one page of older messages in front of the cursor
    ///
    /// Only one page loads at a time; a call made while another is
    /// outstanding returns [`PageOutcome::InFlight`] without fetching.
    /// Reaching the start of the log is reported but never latched, so a
    /// later call fetches again.
    #[instrument(skip(self), fields(path = %self.inner.path.name()))]
    pub async fn load_older(&self) -> SyncResult<PageOutcome> {
        let (cursor, epoch) = {
            let mut state = self.inner.state.lock();
            if !state.initialized {
                return Err(SyncError::NotInitialized);
            }
            if state.in_flight {
                trace!("Page already loading");
                return Ok(PageOutcome::InFlight);
            }
            let Some(cursor) = state.cursor.clone() else {
                state.exhausted = true;
                return Ok(PageOutcome::Exhausted);
            };
            state.in_flight = true;
            (cursor, state.epoch)
        };

        let page_size = self.inner.config.page_size;
        let fetched = self.inner.fetch(Some(&cursor), page_size + 1).await;

        let mut state = self.inner.state.lock();
        if state.epoch != epoch {
            // Detach already released the guard
            debug!(cursor = %cursor, "Page resolved after detach, discarding");
            return Ok(PageOutcome::Discarded);
        }
        state.in_flight = false;
        let entries = fetched?;

        let reached_start = entries.len() < page_size + 1;
        let older: Vec<LogEntry> = entries
            .into_iter()
            .filter(|entry| entry.key < cursor)
            .collect();

        let Some(oldest) = older.first().map(|entry| entry.key.clone()) else {
            state.exhausted = true;
            drop(state);
            debug!(cursor = %cursor, "Reached the start of the log");
            return Ok(PageOutcome::Exhausted);
        };

        let fresh = older
            .into_iter()
            .filter(|entry| !state.window.contains(&entry.key))
            .collect();
        let count = state.window.prepend(&cursor, decode_all(fresh));
        state.cursor = Some(oldest.clone());
        state.exhausted = reached_start;
        let confirmed = state.window.reconcile_pending();
        drop(state);

        self.inner.notify_confirmed(confirmed);
        if count > 0 {
            self.inner.notify(WindowChange::Prepended {
                count,
                oldest: oldest.clone(),
            });
        }
        info!(count, oldest = %oldest, reached_start, "Loaded older page");

        Ok(PageOutcome::Loaded {
            count,
            oldest,
            reached_start,
        })
    }

    /// Load an older page and measure the viewport for scroll anchoring
    pub async fn load_older_with<V>(&self, viewport: &V) -> SyncResult<CompensatedPage>
    where
        V: Viewport + ?Sized,
    {
        let height_before = viewport.content_height();
        let outcome = self.load_older().await?;
        let compensation = (outcome.loaded_count() > 0)
            .then(|| ScrollCompensation::new(height_before));
        Ok(CompensatedPage {
            outcome,
            compensation,
        })
    }

    /// Record whether the reader is looking at the window
    ///
    /// Focusing clears the unread counter and marks the window as seen;
    /// returns how many messages were marked.
    pub async fn set_focused(&self, focused: bool) -> SyncResult<usize> {
        {
            let mut state = self.inner.state.lock();
            state.focused = focused;
            if focused {
                state.unread = 0;
            }
        }
        if focused {
            self.inner.mark_visible().await
        } else {
            Ok(0)
        }
    }

    /// Write `seen_by` for every eligible message in one batch
    pub async fn mark_visible(&self) -> SyncResult<usize> {
        self.inner.mark_visible().await
    }

    /// Stop tailing and invalidate outstanding fetches; idempotent
    pub fn detach(&self) {
        self.inner.detach();
    }

    /// Show an optimistic echo until its confirmed entry arrives
    ///
    /// Without a tail nothing would ever confirm the echo, so none is shown
    /// and this returns false.
    pub(crate) fn add_pending(&self, message: Message) -> bool {
        let Some(nonce) = message.local_nonce.clone() else {
            return false;
        };
        {
            let mut state = self.inner.state.lock();
            if state.tail.is_none() {
                trace!(nonce = %nonce, "Not attached, no echo shown");
                return false;
            }
            state.window.push_pending(message);
        }
        self.inner.notify(WindowChange::PendingAdded { nonce });
        true
    }

    /// Withdraw an optimistic echo; no-op if it was already confirmed
    pub(crate) fn drop_pending(&self, nonce: &str) {
        let dropped = self.inner.state.lock().window.drop_pending(nonce).is_some();
        if dropped {
            self.inner.notify(WindowChange::PendingDropped {
                nonce: nonce.to_string(),
            });
        }
    }

    // === Accessors ===

    /// Confirmed messages, ascending by key
    pub fn messages(&self) -> Vec<Message> {
        self.inner.state.lock().window.messages().cloned().collect()
    }

    /// Everything a renderer draws, pending echoes last
    pub fn snapshot(&self) -> Vec<Message> {
        self.inner
            .state
            .lock()
            .window
            .render_order()
            .cloned()
            .collect()
    }

    pub fn keys(&self) -> Vec<MessageKey> {
        self.inner.state.lock().window.keys().cloned().collect()
    }

    pub fn get(&self, key: &MessageKey) -> Option<Message> {
        self.inner.state.lock().window.get(key).cloned()
    }

    pub fn pending(&self) -> Vec<Message> {
        self.inner.state.lock().window.pending().to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().window.is_empty()
    }

    /// Pagination cursor: the oldest key reached by a completed fetch
    pub fn cursor(&self) -> Option<MessageKey> {
        self.inner.state.lock().cursor.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.inner.state.lock().unread
    }

    pub fn is_focused(&self) -> bool {
        self.inner.state.lock().focused
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.state.lock().initialized
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().in_flight
    }

    pub fn is_exhausted(&self) -> bool {
        self.inner.state.lock().exhausted
    }

    pub fn is_attached(&self) -> bool {
        self.inner.state.lock().tail.is_some()
    }

    /// Subscribe to window change notifications
    pub fn subscribe_changes(&self) -> broadcast::Receiver<WindowChange> {
        self.inner.changes.subscribe()
    }
}

impl EngineInner {
    fn notify(&self, change: WindowChange) {
        // No renderer listening is fine
        let _ = self.changes.send(change);
    }

    fn notify_confirmed(&self, nonces: Vec<String>) {
        for nonce in nonces {
            self.notify(WindowChange::PendingDropped { nonce });
        }
    }

    async fn fetch(
        &self,
        end_key: Option<&MessageKey>,
        limit: usize,
    ) -> SyncResult<Vec<LogEntry>> {
        let timeout = self.config.fetch_timeout();
        let backend = self.session.backend()?;

        match tokio::time::timeout(timeout, backend.range_by_key(&self.path, end_key, limit)).await
        {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(end_key = ?end_key, limit, ?timeout, "Range fetch timed out");
                Err(SyncError::Timeout(timeout))
            }
        }
    }

    /// Bump the epoch and tear down the tail; returns the new epoch
    fn detach(&self) -> u64 {
        let (epoch, tail) = {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.in_flight = false;
            (state.epoch, state.tail.take())
        };

        if let Some(tail) = tail {
            self.session.unsubscribe(tail.id);
            tail.task.abort();
            debug!(subscription = %tail.id, epoch, "Tail detached");
        }
        epoch
    }

    fn apply(&self, epoch: u64, event: LogEvent) -> Applied {
        let me = self.session.profiles().current().map(|profile| profile.id);
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return Applied::Stale;
        }

        match event {
            LogEvent::Added(entry) => {
                if state.window.contains(&entry.key) {
                    trace!(key = %entry.key, "Duplicate added event");
                    return Applied::Quiet;
                }
                let message = match Message::from_entry(&entry) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(key = %entry.key, error = %e, "Skipping malformed entry");
                        return Applied::Quiet;
                    }
                };

                let confirmed = message
                    .local_nonce
                    .as_deref()
                    .and_then(|nonce| state.window.drop_pending(nonce))
                    .and_then(|echo| echo.local_nonce);

                // Behind the cursor is pagination's range; inserting here would leave a gap
                if state.cursor.as_ref().is_some_and(|cursor| entry.key < *cursor) {
                    drop(state);
                    trace!(key = %entry.key, "Added event behind the cursor, left to pagination");
                    self.notify_confirmed(confirmed.into_iter().collect());
                    return Applied::Quiet;
                }

                let from_other = !me.as_ref().is_some_and(|me| message.is_authored_by(me));
                let key = message.key.clone();
                state.window.insert(message);
                if state.cursor.is_none() {
                    state.cursor = Some(key.clone());
                }

                let applied = if state.focused {
                    Applied::MarkVisible
                } else {
                    if from_other {
                        state.unread += 1;
                    }
                    Applied::Quiet
                };
                drop(state);

                if let Some(nonce) = confirmed {
                    self.notify(WindowChange::PendingDropped { nonce });
                }
                self.notify(WindowChange::Appended { key });
                applied
            }
            LogEvent::Changed(entry) => {
                match Message::from_entry(&entry) {
                    Ok(message) => {
                        if state.window.replace(message) {
                            drop(state);
                            self.notify(WindowChange::Changed { key: entry.key });
                        }
                    }
                    Err(e) => warn!(key = %entry.key, error = %e, "Skipping malformed change"),
                }
                Applied::Quiet
            }
            LogEvent::Removed { key } => {
                if state.window.remove(&key).is_some() {
                    drop(state);
                    self.notify(WindowChange::Removed { key });
                }
                Applied::Quiet
            }
        }
    }

    async fn mark_visible(&self) -> SyncResult<usize> {
        let profile = self.session.profile()?;
        let batch = {
            let state = self.state.lock();
            seen_batch(&state.window, &profile.id, profile.effective_name())
        };
        if batch.is_empty() {
            return Ok(0);
        }

        self.session
            .backend()?
            .update_many(&self.path, &batch)
            .await?;
        debug!(count = batch.len(), reader = %profile.id, "Marked messages seen");
        Ok(batch.len())
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Drive tail events into the window until detached or dropped
async fn pump(engine: Weak<EngineInner>, epoch: u64, mut events: BoxStream<'static, LogEvent>) {
    while let Some(event) = events.next().await {
        let Some(inner) = engine.upgrade() else {
            break;
        };
        match inner.apply(epoch, event) {
            Applied::Stale => break,
            Applied::Quiet => {}
            Applied::MarkVisible => {
                if let Err(e) = inner.mark_visible().await {
                    warn!(error = %e, "Could not mark live message as seen");
                }
            }
        }
    }
    trace!(epoch, "Tail pump finished");
}

/// Decode entries, skipping any that are malformed
fn decode_all(entries: Vec<LogEntry>) -> Vec<Message> {
    entries
        .iter()
        .filter_map(|entry| match Message::from_entry(entry) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(key = %entry.key, error = %e, "Skipping malformed entry");
                None
            }
        })
        .collect()
}
