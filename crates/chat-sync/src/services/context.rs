//! Service context - dependency container for services
//!
//! Holds the session, the sync engine for the main message log, the optional
//! media uploader, and configuration.

use std::sync::Arc;

use chat_common::AppConfig;
use chat_core::{
    DomainError, LogBackend, LogEntry, LogPath, MediaUploader, Message, MessageKey, Profile,
};

use crate::engine::SyncEngine;
use crate::error::SyncResult;
use crate::session::Session;

use super::profile::ProfileStore;

/// Service context containing all dependencies
#[derive(Clone)]
pub struct ChatContext {
    session: Arc<Session>,
    engine: SyncEngine,
    uploader: Option<Arc<dyn MediaUploader>>,
    config: Arc<AppConfig>,
}

impl ChatContext {
    /// Create a context with an engine over the message log
    pub fn new(session: Arc<Session>, config: AppConfig) -> Self {
        let engine = SyncEngine::new(Arc::clone(&session), config.sync.clone());
        Self {
            session,
            engine,
            uploader: None,
            config: Arc::new(config),
        }
    }

    /// Attach a media uploader
    #[must_use]
    pub fn with_uploader(mut self, uploader: Arc<dyn MediaUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    // === Session ===

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Get the backend, failing once the session is closed
    pub fn backend(&self) -> SyncResult<&dyn LogBackend> {
        self.session.backend()
    }

    pub fn profiles(&self) -> &ProfileStore {
        self.session.profiles()
    }

    /// Current local profile
    pub fn profile(&self) -> SyncResult<Profile> {
        self.session.profile()
    }

    /// Require the local profile to be a moderator
    pub fn require_moderator(&self) -> SyncResult<Profile> {
        self.session.profiles().require_moderator()
    }

    // === Engine ===

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    // === Collaborators ===

    pub fn uploader(&self) -> Option<&dyn MediaUploader> {
        self.uploader.as_deref()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Find a message, preferring the window over a backend read
    pub async fn find_message(&self, key: &MessageKey) -> SyncResult<Message> {
        match self.engine.get(key) {
            Some(message) => Ok(message),
            None => self.fetch_message(key).await,
        }
    }

    /// Read the stored message, bypassing the window
    pub async fn fetch_message(&self, key: &MessageKey) -> SyncResult<Message> {
        let value = self
            .backend()?
            .get(&LogPath::Messages, key)
            .await?
            .ok_or_else(|| DomainError::MessageNotFound(key.clone()))?;
        Ok(Message::from_entry(&LogEntry::new(key.clone(), value))?)
    }
}

impl std::fmt::Debug for ChatContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatContext")
            .field("session", &self.session)
            .field("engine", &self.engine)
            .field("uploader", &self.uploader.is_some())
            .finish()
    }
}
