//! Reaction service
//!
//! Toggles the local user's reactions with single-cell writes.

use chat_core::{LogPath, Message, MessageKey, ReactionSummary};
use tracing::{info, instrument};
use validator::Validate;

use crate::dto::ReactionRequest;
use crate::error::SyncResult;

use super::context::ChatContext;

/// Symbols shown in the compact summary
const SUMMARY_TOP: usize = 3;

/// What a toggle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
}

/// Reaction service
pub struct ReactionService<'a> {
    ctx: &'a ChatContext,
}

impl<'a> ReactionService<'a> {
    /// Create a new ReactionService
    pub fn new(ctx: &'a ChatContext) -> Self {
        Self { ctx }
    }

    /// Flip the local user's membership under `symbol`
    ///
    /// Membership is read from the stored entry, so a stale window cannot
    /// turn a removal into a second add.
    #[instrument(skip(self))]
    pub async fn toggle(
        &self,
        message_key: &MessageKey,
        request: ReactionRequest,
    ) -> SyncResult<ToggleOutcome> {
        request.validate()?;
        let profile = self.ctx.profile()?;

        let stored = self.ctx.fetch_message(message_key).await?;
        let present = stored.reactions.contains(&request.symbol, &profile.id);

        let patch = Message::reaction_patch(&request.symbol, &profile.id, !present);
        self.ctx
            .backend()?
            .update(&LogPath::Messages, message_key, &patch)
            .await?;

        let outcome = if present {
            ToggleOutcome::Removed
        } else {
            ToggleOutcome::Added
        };
        info!(
            message_key = %message_key,
            symbol = %request.symbol,
            outcome = ?outcome,
            "Reaction toggled"
        );
        Ok(outcome)
    }

    /// Top symbols and total for a message, from the window
    pub async fn summary(&self, message_key: &MessageKey) -> SyncResult<ReactionSummary> {
        let profile = self.ctx.profile()?;
        let message = self.ctx.find_message(message_key).await?;
        Ok(message.reactions.summary(SUMMARY_TOP, Some(&profile.id)))
    }
}
