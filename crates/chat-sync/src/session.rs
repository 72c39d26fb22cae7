//! Connection session
//!
//! Binds a joined profile to a log backend and owns every tail subscription
//! opened through it, so closing the session detaches them all at once.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chat_core::{
    DomainError, LogBackend, LogPath, MessageKey, Profile, Subscription, SubscriptionId, UserId,
};
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::error::SyncResult;
use crate::services::ProfileStore;

/// An open connection to the log backend
pub struct Session {
    backend: Arc<dyn LogBackend>,
    profiles: Arc<ProfileStore>,
    closed: AtomicBool,
    subscriptions: Mutex<HashSet<SubscriptionId>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("closed", &self.is_closed())
            .field("subscriptions", &self.open_subscriptions())
            .finish()
    }
}

impl Session {
    /// Open a session for the joined profile
    pub fn open(
        backend: Arc<dyn LogBackend>,
        profiles: Arc<ProfileStore>,
    ) -> SyncResult<Arc<Self>> {
        let profile = profiles.require()?;
        info!(user = %profile.id, "Session opened");

        Ok(Arc::new(Self {
            backend,
            profiles,
            closed: AtomicBool::new(false),
            subscriptions: Mutex::new(HashSet::new()),
        }))
    }

    /// Get the backend, failing once the session is closed
    pub fn backend(&self) -> SyncResult<&dyn LogBackend> {
        if self.is_closed() {
            return Err(DomainError::SessionClosed.into());
        }
        Ok(self.backend.as_ref())
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    /// Current local profile
    pub fn profile(&self) -> SyncResult<Profile> {
        self.profiles.require()
    }

    pub fn user_id(&self) -> SyncResult<UserId> {
        Ok(self.profiles.require()?.id)
    }

    /// Open a tail subscription owned by this session
    #[instrument(skip(self), fields(path = %path.name()))]
    pub async fn subscribe(
        &self,
        path: &LogPath,
        from_key: Option<&MessageKey>,
    ) -> SyncResult<Subscription> {
        let subscription = self.backend()?.subscribe(path, from_key).await?;

        // Closed while the subscribe call was outstanding
        if self.is_closed() {
            self.backend.unsubscribe(subscription.id);
            return Err(DomainError::SessionClosed.into());
        }

        self.subscriptions.lock().insert(subscription.id);
        debug!(subscription = %subscription.id, "Subscription tracked");
        Ok(subscription)
    }

    /// Cancel one subscription; idempotent
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.subscriptions.lock().remove(&id) {
            self.backend.unsubscribe(id);
            debug!(subscription = %id, "Subscription released");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of subscriptions still open
    pub fn open_subscriptions(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Close the session and every subscription it opened; idempotent
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let ids: Vec<SubscriptionId> = self.subscriptions.lock().drain().collect();
        for id in &ids {
            self.backend.unsubscribe(*id);
        }
        info!(released = ids.len(), "Session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
