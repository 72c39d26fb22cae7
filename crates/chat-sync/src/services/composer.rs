//! Outbound composer
//!
//! Sends, edits and deletes messages. Every rule that can be checked locally
//! is checked before the backend sees a request.

use chat_core::{DomainError, LogPath, MediaAttachment, Message, MessageKey, Profile};
use chrono::Utc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::dto::{Attachment, EditMessageRequest, SendMessageRequest};
use crate::error::{SyncError, SyncResult};

use super::context::ChatContext;

/// How a message will be deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Author self-delete: content cleared, shell kept in the log
    Soft,
    /// Moderator delete of someone else's message: entry removed
    Hard,
}

impl DeleteMode {
    /// Prompt shown before the caller confirms
    pub fn confirmation_prompt(self) -> &'static str {
        match self {
            Self::Soft => "Delete this message? A placeholder will remain.",
            Self::Hard => "Remove this message for everyone? This cannot be undone.",
        }
    }
}

/// Outbound composer
pub struct Composer<'a> {
    ctx: &'a ChatContext,
}

impl<'a> Composer<'a> {
    /// Create a new Composer
    pub fn new(ctx: &'a ChatContext) -> Self {
        Self { ctx }
    }

    /// Send a new message
    ///
    /// The attachment is uploaded first; an upload failure creates no entry.
    /// While the engine is attached the window shows a pending echo until the
    /// confirmed entry arrives.
    #[instrument(skip(self, request))]
    pub async fn send(&self, request: SendMessageRequest) -> SyncResult<MessageKey> {
        request.validate()?;
        let sync = &self.ctx.config().sync;

        let body = request
            .body
            .as_deref()
            .map(str::trim)
            .filter(|body| !body.is_empty())
            .map(str::to_string);
        if body.is_none() && request.attachment.is_none() {
            return Err(DomainError::EmptyMessage.into());
        }
        if let Some(body) = &body {
            check_length(body, sync.max_body_len)?;
        }

        let profile = self.ctx.profile()?;

        let reply_to = match &request.reply_to {
            Some(key) => Some(
                self.ctx
                    .find_message(key)
                    .await?
                    .reply_ref(sync.reply_preview_len),
            ),
            None => None,
        };

        let media = match request.attachment {
            Some(attachment) => Some(self.upload(attachment).await?),
            None => None,
        };

        let nonce = uuid::Uuid::new_v4().to_string();
        let draft = Message::draft(&profile, nonce.clone())
            .with_body(body)
            .with_media(media)
            .with_reply(reply_to);
        let value = draft.to_value()?;

        let engine = self.ctx.engine();
        let echoed = engine.add_pending(draft);

        match self.push(value).await {
            Ok(key) => {
                if echoed && !engine.is_attached() {
                    // Detached mid-send; no tail is left to confirm the echo
                    engine.drop_pending(&nonce);
                }
                info!(message_key = %key, author = %profile.id, "Message sent");
                Ok(key)
            }
            Err(e) => {
                engine.drop_pending(&nonce);
                warn!(error = %e, "Send failed, echo withdrawn");
                Err(e)
            }
        }
    }

    async fn push(&self, value: serde_json::Value) -> SyncResult<MessageKey> {
        Ok(self.ctx.backend()?.push(&LogPath::Messages, value).await?)
    }

    async fn upload(&self, attachment: Attachment) -> SyncResult<MediaAttachment> {
        let Some(uploader) = self.ctx.uploader() else {
            return Err(
                DomainError::UploadFailed("no media uploader configured".to_string()).into(),
            );
        };

        let max = self.ctx.config().upload.max_file_size_bytes();
        if attachment.bytes.len() > max {
            return Err(
                DomainError::UploadFailed(format!("file exceeds the {max} byte limit")).into(),
            );
        }

        let url = uploader
            .upload(attachment.bytes, &attachment.mime_type, &attachment.filename)
            .await?;
        info!(url = %url, mime_type = %attachment.mime_type, "Attachment uploaded");
        Ok(MediaAttachment::new(
            url,
            &attachment.mime_type,
            Some(attachment.filename),
        ))
    }

    // === Edit ===

    /// Check if the local user may still edit a message
    pub async fn can_edit(&self, key: &MessageKey) -> SyncResult<bool> {
        let profile = self.ctx.profile()?;
        let message = self.ctx.find_message(key).await?;
        Ok(self.check_editable(&message, &profile).is_ok())
    }

    /// Replace the body of an own message inside the edit window
    #[instrument(skip(self, request))]
    pub async fn edit(&self, key: &MessageKey, request: EditMessageRequest) -> SyncResult<()> {
        request.validate()?;
        let body = request.body.trim();
        if body.is_empty() {
            return Err(DomainError::EmptyMessage.into());
        }
        check_length(body, self.ctx.config().sync.max_body_len)?;

        let profile = self.ctx.profile()?;
        let message = self.ctx.find_message(key).await?;
        self.check_editable(&message, &profile)?;

        self.ctx
            .backend()?
            .update(&LogPath::Messages, key, &Message::edit_patch(body))
            .await?;

        info!(message_key = %key, "Message edited");
        Ok(())
    }

    fn check_editable(&self, message: &Message, profile: &Profile) -> SyncResult<()> {
        if !message.is_authored_by(&profile.id) {
            return Err(DomainError::NotMessageAuthor.into());
        }
        if message.deleted {
            return Err(SyncError::validation("Deleted messages cannot be edited"));
        }
        let window = self.ctx.config().sync.edit_window();
        if !message.within_edit_window(Utc::now(), window) {
            return Err(DomainError::EditWindowExpired.into());
        }
        Ok(())
    }

    // === Delete ===

    /// Decide how the local user would delete a message
    pub async fn plan_delete(&self, key: &MessageKey) -> SyncResult<DeleteMode> {
        let profile = self.ctx.profile()?;
        let message = self.ctx.find_message(key).await?;
        delete_mode(&message, &profile)
    }

    /// Delete a message after the caller confirmed `confirmed`
    ///
    /// The confirmation must match the planned mode, so a soft-delete prompt
    /// can never authorize a removal.
    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        key: &MessageKey,
        confirmed: DeleteMode,
    ) -> SyncResult<DeleteMode> {
        let planned = self.plan_delete(key).await?;
        if planned != confirmed {
            return Err(SyncError::validation(format!(
                "Confirmed {confirmed:?} delete but this message requires {planned:?}"
            )));
        }

        let backend = self.ctx.backend()?;
        match planned {
            DeleteMode::Soft => {
                backend
                    .update(&LogPath::Messages, key, &Message::soft_delete_patch())
                    .await?;
            }
            DeleteMode::Hard => backend.remove(&LogPath::Messages, key).await?,
        }

        info!(message_key = %key, mode = ?planned, "Message deleted");
        Ok(planned)
    }
}

fn check_length(body: &str, max: usize) -> SyncResult<()> {
    if body.chars().count() > max {
        return Err(DomainError::ContentTooLong { max }.into());
    }
    Ok(())
}

fn delete_mode(message: &Message, profile: &Profile) -> SyncResult<DeleteMode> {
    if message.is_authored_by(&profile.id) {
        Ok(DeleteMode::Soft)
    } else if profile.is_moderator {
        Ok(DeleteMode::Hard)
    } else {
        Err(DomainError::NotMessageAuthor.into())
    }
}
