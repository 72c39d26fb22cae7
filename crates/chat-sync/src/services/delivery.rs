//! Delivery tracker
//!
//! Derives sent/seen state and records the local reader in `seen_by` for
//! messages that scrolled into a focused view.

use chat_core::{DeliveryStatus, Message, MessageKey, Patch, UserId};
use tracing::instrument;

use crate::error::SyncResult;
use crate::window::MessageWindow;

use super::context::ChatContext;

/// Messages in `window` that `reader` has not yet been recorded on
///
/// Pending echoes, soft-deleted shells and the reader's own messages never
/// qualify.
pub(crate) fn seen_candidates<'a>(
    window: &'a MessageWindow,
    reader: &'a UserId,
) -> impl Iterator<Item = &'a Message> + 'a {
    window.messages().filter(move |message| {
        message.status == DeliveryStatus::Sent
            && !message.deleted
            && !message.is_authored_by(reader)
            && !message.is_seen_by(reader)
    })
}

/// Build the single batched update recording `reader` on every candidate
pub(crate) fn seen_batch(
    window: &MessageWindow,
    reader: &UserId,
    display_name: &str,
) -> Vec<(MessageKey, Patch)> {
    seen_candidates(window, reader)
        .map(|message| {
            (
                message.key.clone(),
                Message::seen_patch(reader, display_name),
            )
        })
        .collect()
}

/// Delivery tracker
pub struct DeliveryTracker<'a> {
    ctx: &'a ChatContext,
}

impl<'a> DeliveryTracker<'a> {
    /// Create a new DeliveryTracker
    pub fn new(ctx: &'a ChatContext) -> Self {
        Self { ctx }
    }

    /// Record the local reader on every eligible message in the window
    ///
    /// One batched write; returns how many messages were marked.
    #[instrument(skip(self))]
    pub async fn mark_visible(&self) -> SyncResult<usize> {
        self.ctx.engine().mark_visible().await
    }

    /// Delivery status of a windowed message
    pub fn status(&self, key: &MessageKey) -> Option<DeliveryStatus> {
        self.ctx
            .engine()
            .get(key)
            .map(|message| message.delivery_status())
    }
}
