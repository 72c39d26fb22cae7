//! Moderation service
//!
//! Pinning, reporting and the report queue.

use chat_core::{DomainError, LogPath, MessageKey, PinnedRef, ReportEntry, PINNED_SLOT};
use tracing::{info, instrument, warn};

use crate::error::SyncResult;

use super::context::ChatContext;

/// Moderation service
pub struct ModerationService<'a> {
    ctx: &'a ChatContext,
}

impl<'a> ModerationService<'a> {
    /// Create a new ModerationService
    pub fn new(ctx: &'a ChatContext) -> Self {
        Self { ctx }
    }

    fn pinned_slot() -> MessageKey {
        MessageKey::new(PINNED_SLOT)
    }

    /// Pin a message, replacing whatever was pinned
    #[instrument(skip(self))]
    pub async fn pin(&self, message_key: &MessageKey) -> SyncResult<PinnedRef> {
        let moderator = self.ctx.require_moderator()?;
        let message = self.ctx.find_message(message_key).await?;

        let pinned = PinnedRef::new(
            &message,
            moderator.id.clone(),
            self.ctx.config().sync.reply_preview_len,
        );
        let value =
            serde_json::to_value(&pinned).map_err(|e| DomainError::InternalError(e.to_string()))?;
        self.ctx
            .backend()?
            .set(&LogPath::Pinned, &Self::pinned_slot(), value)
            .await?;

        info!(message_key = %message_key, moderator = %moderator.id, "Message pinned");
        Ok(pinned)
    }

    /// Clear the pinned slot
    #[instrument(skip(self))]
    pub async fn unpin(&self) -> SyncResult<()> {
        let moderator = self.ctx.require_moderator()?;
        self.ctx
            .backend()?
            .remove(&LogPath::Pinned, &Self::pinned_slot())
            .await?;

        info!(moderator = %moderator.id, "Pin cleared");
        Ok(())
    }

    /// Currently pinned message, if any
    pub async fn pinned(&self) -> SyncResult<Option<PinnedRef>> {
        let slot = Self::pinned_slot();
        let Some(value) = self.ctx.backend()?.get(&LogPath::Pinned, &slot).await? else {
            return Ok(None);
        };

        let pinned = serde_json::from_value(value).map_err(|e| DomainError::MalformedEntry {
            key: slot,
            reason: e.to_string(),
        })?;
        Ok(Some(pinned))
    }

    /// Report a message to the moderators; open to every participant
    #[instrument(skip(self))]
    pub async fn report(&self, message_key: &MessageKey) -> SyncResult<MessageKey> {
        let reporter = self.ctx.profile()?;
        let message = self.ctx.find_message(message_key).await?;

        let report = ReportEntry::new(
            &message,
            reporter.id.clone(),
            self.ctx.config().sync.reply_preview_len,
        );
        let value =
            serde_json::to_value(&report).map_err(|e| DomainError::InternalError(e.to_string()))?;
        let key = self.ctx.backend()?.push(&LogPath::Reports, value).await?;

        info!(report_key = %key, message_key = %message_key, "Message reported");
        Ok(key)
    }

    /// Most recent reports, oldest first
    #[instrument(skip(self))]
    pub async fn list_reports(&self, limit: usize) -> SyncResult<Vec<ReportEntry>> {
        self.ctx.require_moderator()?;

        let entries = self
            .ctx
            .backend()?
            .range_by_key(&LogPath::Reports, None, limit)
            .await?;

        Ok(entries
            .iter()
            .filter_map(|entry| match ReportEntry::from_entry(entry) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(key = %entry.key, error = %e, "Skipping malformed report");
                    None
                }
            })
            .collect())
    }

    /// Dismiss a report; the reported message is left alone
    #[instrument(skip(self))]
    pub async fn resolve(&self, report_key: &MessageKey) -> SyncResult<()> {
        let moderator = self.ctx.require_moderator()?;
        self.ctx
            .backend()?
            .remove(&LogPath::Reports, report_key)
            .await?;

        info!(report_key = %report_key, moderator = %moderator.id, "Report resolved");
        Ok(())
    }
}
