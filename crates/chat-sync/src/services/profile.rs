//! Profile store
//!
//! Owns the local participant's identity: joining, moderator elevation, and
//! the moderator override that follows a moderator across devices.

use std::sync::Arc;

use chat_common::{AppError, PassphraseVerifier};
use chat_core::{
    DomainError, LogBackend, LogPath, MessageKey, ModeratorOverride, Profile, ProfileCache,
    UserId,
};
use parking_lot::RwLock;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::dto::{JoinRequest, OverrideRequest};
use crate::error::{SyncError, SyncResult};

/// Where a saved override ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideSave {
    /// Cached on this device and written to the backend
    PersistedRemotely,
    /// Cached on this device only; other devices will not see it
    CachedLocallyOnly { reason: String },
}

impl OverrideSave {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::PersistedRemotely)
    }
}

/// Profile store
pub struct ProfileStore {
    backend: Arc<dyn LogBackend>,
    cache: Arc<dyn ProfileCache>,
    verifier: PassphraseVerifier,
    current: RwLock<Option<Profile>>,
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore")
            .field("current", &*self.current.read())
            .field("elevation", &self.verifier.is_configured())
            .finish()
    }
}

impl ProfileStore {
    pub fn new(
        backend: Arc<dyn LogBackend>,
        cache: Arc<dyn ProfileCache>,
        verifier: PassphraseVerifier,
    ) -> Self {
        Self {
            backend,
            cache,
            verifier,
            current: RwLock::new(None),
        }
    }

    /// Create the local profile with a fresh id
    #[instrument(skip(self, request), fields(display_name = %request.display_name))]
    pub fn join(&self, request: JoinRequest) -> SyncResult<Profile> {
        request.validate()?;

        let id = UserId::new(uuid::Uuid::new_v4().to_string());
        let profile =
            Profile::new(id, request.display_name.trim().to_string()).with_avatar(request.avatar);
        *self.current.write() = Some(profile.clone());

        info!(user = %profile.id, "Joined");
        Ok(profile)
    }

    /// Restore a previously joined profile at startup
    ///
    /// A moderator gets their cached override back even when the backend is
    /// unreachable.
    #[instrument(skip(self, profile), fields(user = %profile.id))]
    pub async fn bootstrap(&self, mut profile: Profile) -> SyncResult<Profile> {
        if profile.is_moderator {
            match self.cache.load(&profile.id).await {
                Ok(Some(cached)) => profile.moderator_override = Some(cached),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Override cache unreadable at bootstrap"),
            }
        }
        *self.current.write() = Some(profile.clone());
        Ok(profile)
    }

    /// Get the local profile, if joined
    pub fn current(&self) -> Option<Profile> {
        self.current.read().clone()
    }

    /// Get the local profile or fail
    pub fn require(&self) -> SyncResult<Profile> {
        self.current()
            .ok_or(SyncError::Domain(DomainError::ProfileNotFound))
    }

    /// Require the local profile to be a moderator
    pub fn require_moderator(&self) -> SyncResult<Profile> {
        let profile = self.require()?;
        if profile.is_moderator {
            Ok(profile)
        } else {
            Err(DomainError::NotModerator.into())
        }
    }

    /// Elevate the local profile to moderator
    #[instrument(skip(self, passphrase))]
    pub async fn elevate(&self, passphrase: &str) -> SyncResult<Profile> {
        let profile = self.require()?;

        // Argon2 verification blocks; keep it off the async workers
        let verifier = self.verifier.clone();
        let passphrase = passphrase.to_string();
        tokio::task::spawn_blocking(move || verifier.verify_or_error(&passphrase))
            .await
            .map_err(AppError::internal)?
            .map_err(|e| match e {
                AppError::InvalidCredentials => SyncError::Domain(DomainError::InvalidPassphrase),
                other => SyncError::App(other),
            })?;

        let moderator_override = self.load_override(&profile.id).await;
        let profile = {
            let mut current = self.current.write();
            let Some(current) = current.as_mut() else {
                return Err(DomainError::ProfileNotFound.into());
            };
            current.is_moderator = true;
            current.moderator_override = moderator_override;
            current.clone()
        };

        info!(user = %profile.id, "Elevated to moderator");
        Ok(profile)
    }

    /// Read the override from the backend, falling back to the local cache
    async fn load_override(&self, user: &UserId) -> Option<ModeratorOverride> {
        let key = MessageKey::new(user.as_str());
        match self.backend.get(&LogPath::ModeratorProfiles, &key).await {
            Ok(Some(value)) => match serde_json::from_value::<ModeratorOverride>(value) {
                Ok(remote) => {
                    if let Err(e) = self.cache.store(user, &remote).await {
                        warn!(error = %e, "Could not refresh override cache");
                    }
                    return Some(remote);
                }
                Err(e) => warn!(error = %e, "Ignoring malformed remote override"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Remote override unavailable, using cache"),
        }

        self.cache.load(user).await.unwrap_or_else(|e| {
            warn!(error = %e, "Override cache unreadable");
            None
        })
    }

    /// Save the moderator override
    ///
    /// Always cached locally first; the result says whether the backend write
    /// also succeeded.
    #[instrument(skip(self, request))]
    pub async fn save_override(&self, request: OverrideRequest) -> SyncResult<OverrideSave> {
        request.validate()?;
        let profile = self.require_moderator()?;

        let value = ModeratorOverride::new(request.nickname, request.avatar, request.badge);
        self.cache.store(&profile.id, &value).await?;
        if let Some(current) = self.current.write().as_mut() {
            current.moderator_override = Some(value.clone());
        }

        let encoded =
            serde_json::to_value(&value).map_err(|e| DomainError::InternalError(e.to_string()))?;
        let key = MessageKey::new(profile.id.as_str());
        match self
            .backend
            .set(&LogPath::ModeratorProfiles, &key, encoded)
            .await
        {
            Ok(()) => {
                info!(user = %profile.id, "Moderator override saved");
                Ok(OverrideSave::PersistedRemotely)
            }
            Err(e) => {
                warn!(user = %profile.id, error = %e, "Override cached locally only");
                Ok(OverrideSave::CachedLocallyOnly {
                    reason: e.to_string(),
                })
            }
        }
    }
}
