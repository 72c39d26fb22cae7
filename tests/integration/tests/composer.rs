//! Outbound composer tests
//!
//! Sending with local echo, replies, attachments, the edit window and both
//! delete modes. Run with: cargo test -p integration-tests --test composer

use std::sync::Arc;

use chat_core::{LogPath, MediaKind, MediaUploader};
use chat_sync::dto::{Attachment, EditMessageRequest, SendMessageRequest};
use chat_sync::{Composer, DeleteMode, WindowChange};
use chrono::Duration;
use integration_tests::*;

fn edit(body: &str) -> EditMessageRequest {
    EditMessageRequest {
        body: body.to_string(),
    }
}

fn png(len: usize) -> Attachment {
    Attachment {
        bytes: vec![0x89; len],
        mime_type: "image/png".to_string(),
        filename: "cat.png".to_string(),
    }
}

// ============================================================================
// Send
// ============================================================================

#[tokio::test]
async fn test_send_shows_echo_until_confirmed() {
    let log = ControlledLog::new();
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();
    let engine = ctx.engine();
    engine.initialize(30).await.unwrap();
    let mut changes = engine.subscribe_changes();

    let key = Composer::new(&ctx)
        .send(SendMessageRequest::text("  hello there  "))
        .await
        .unwrap();

    let WindowChange::PendingAdded { nonce } = changes.recv().await.unwrap() else {
        panic!("echo must be shown first");
    };
    assert_eq!(
        changes.recv().await.unwrap(),
        WindowChange::PendingDropped {
            nonce: nonce.clone()
        }
    );
    assert_eq!(
        changes.recv().await.unwrap(),
        WindowChange::Appended { key: key.clone() }
    );

    assert!(engine.pending().is_empty());
    let confirmed = engine.get(&key).unwrap();
    assert_eq!(confirmed.body.as_deref(), Some("hello there"));
    assert_eq!(confirmed.local_nonce.as_deref(), Some(nonce.as_str()));
    assert!(!confirmed.is_pending());
    assert!(engine.snapshot().iter().all(|message| !message.key.is_local()));

    let stored = stored_message(log.log(), &key).unwrap();
    assert_eq!(stored.author_name, "alice");
    assert_eq!(stored.author_id, ctx.profile().unwrap().id);
}

#[tokio::test]
async fn test_send_rejects_empty_and_oversized_bodies() {
    let log = ControlledLog::new();
    let mut config = test_config();
    config.sync.max_body_len = 10;
    let ctx = join_chat(log.backend(), "alice", config).unwrap();
    let composer = Composer::new(&ctx);

    let err = composer.send(SendMessageRequest::text("   ")).await.unwrap_err();
    assert_eq!(err.error_code(), "EMPTY_MESSAGE");

    let err = composer.send(SendMessageRequest::default()).await.unwrap_err();
    assert_eq!(err.error_code(), "EMPTY_MESSAGE");

    let err = composer
        .send(SendMessageRequest::text("x".repeat(11)))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CONTENT_TOO_LONG");

    // Length counts characters, not bytes
    composer
        .send(SendMessageRequest::text("é".repeat(10)))
        .await
        .unwrap();

    assert_eq!(log.log().len(&LogPath::Messages), 1);
}

#[tokio::test]
async fn test_failed_send_withdraws_echo() {
    let log = ControlledLog::new();
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();
    let engine = ctx.engine();
    engine.initialize(30).await.unwrap();
    let mut changes = engine.subscribe_changes();

    log.fail_writes(WriteFailure::Unavailable);
    let err = Composer::new(&ctx)
        .send(SendMessageRequest::text("hello"))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "BACKEND_UNAVAILABLE");
    assert!(err.is_transient());
    assert!(engine.pending().is_empty());
    assert!(engine.is_empty());
    assert!(log.log().is_empty(&LogPath::Messages));

    let WindowChange::PendingAdded { nonce } = changes.recv().await.unwrap() else {
        panic!("echo must be shown first");
    };
    assert_eq!(
        changes.recv().await.unwrap(),
        WindowChange::PendingDropped { nonce }
    );
}

#[tokio::test]
async fn test_send_while_detached_shows_no_echo() {
    let log = ControlledLog::new();
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();
    let engine = ctx.engine();
    let composer = Composer::new(&ctx);

    // Never initialized
    composer.send(SendMessageRequest::text("early")).await.unwrap();
    assert!(engine.pending().is_empty());

    engine.initialize(30).await.unwrap();
    engine.detach();
    let mut changes = engine.subscribe_changes();

    let key = composer
        .send(SendMessageRequest::text("after detach"))
        .await
        .unwrap();

    assert!(engine.pending().is_empty());
    assert!(changes.try_recv().is_err());
    assert!(stored_message(log.log(), &key).is_some());
}

#[tokio::test]
async fn test_reinitialize_reconciles_unconfirmed_echo() {
    let log = ControlledLog::new();
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();
    let engine = ctx.engine();
    engine.initialize(30).await.unwrap();

    log.mute_tails();
    let key = Composer::new(&ctx)
        .send(SendMessageRequest::text("lost in transit"))
        .await
        .unwrap();
    assert_eq!(engine.pending().len(), 1);
    assert!(engine.get(&key).is_none());
    let nonce = engine.pending()[0].local_nonce.clone().unwrap();

    log.unmute_tails();
    let mut changes = engine.subscribe_changes();
    assert_eq!(engine.initialize(30).await.unwrap(), 1);

    assert!(engine.pending().is_empty());
    assert!(engine.get(&key).is_some());
    assert_eq!(changes.recv().await.unwrap(), WindowChange::Reset { len: 1 });
    assert_eq!(
        changes.recv().await.unwrap(),
        WindowChange::PendingDropped { nonce }
    );
}

#[tokio::test]
async fn test_reply_snapshot_survives_edit_and_delete() {
    let log = ControlledLog::new();
    let author = fixture_author();
    seed_authored(log.log(), &fixture_key(1), &author, "original words", Duration::seconds(5));
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();

    let reply_key = Composer::new(&ctx)
        .send(SendMessageRequest::text("agreed").replying_to(fixture_key(1)))
        .await
        .unwrap();

    let reply = stored_message(log.log(), &reply_key).unwrap().reply_to.unwrap();
    assert_eq!(reply.key, fixture_key(1));
    assert_eq!(reply.preview, "original words");
    assert_eq!(reply.author_name, "Fixture Author");

    let backend = log.backend();
    backend
        .update(
            &LogPath::Messages,
            &fixture_key(1),
            &chat_core::Message::edit_patch("rewritten"),
        )
        .await
        .unwrap();
    backend
        .remove(&LogPath::Messages, &fixture_key(1))
        .await
        .unwrap();

    let reply_after = stored_message(log.log(), &reply_key)
        .unwrap()
        .reply_to
        .unwrap();
    assert_eq!(reply_after, reply);
}

#[tokio::test]
async fn test_reply_to_unknown_message_sends_nothing() {
    let log = ControlledLog::new();
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();

    let err = Composer::new(&ctx)
        .send(SendMessageRequest::text("hello").replying_to(fixture_key(9)))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "UNKNOWN_MESSAGE");
    assert!(log.log().is_empty(&LogPath::Messages));
}

// ============================================================================
// Attachments
// ============================================================================

#[tokio::test]
async fn test_upload_failure_creates_no_entry() {
    let log = ControlledLog::new();
    let uploader = ScriptedUploader::failing();
    let ctx = join_chat(log.backend(), "alice", test_config())
        .unwrap()
        .with_uploader(uploader.clone() as Arc<dyn MediaUploader>);
    ctx.engine().initialize(30).await.unwrap();

    let err = Composer::new(&ctx)
        .send(SendMessageRequest::text("look").with_attachment(png(64)))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "UPLOAD_FAILED");
    assert_eq!(uploader.calls(), 1);
    assert!(log.log().is_empty(&LogPath::Messages));
    assert!(ctx.engine().pending().is_empty());
}

#[tokio::test]
async fn test_attachment_without_uploader_is_rejected() {
    let log = ControlledLog::new();
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();

    let err = Composer::new(&ctx)
        .send(SendMessageRequest::default().with_attachment(png(64)))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "UPLOAD_FAILED");
    assert!(log.log().is_empty(&LogPath::Messages));
}

#[tokio::test]
async fn test_oversized_attachment_is_not_uploaded() {
    let log = ControlledLog::new();
    let uploader = ScriptedUploader::succeeding("https://media.test/cat.png");
    let mut config = test_config();
    config.upload.max_file_size_mb = 1;
    let ctx = join_chat(log.backend(), "alice", config)
        .unwrap()
        .with_uploader(uploader.clone() as Arc<dyn MediaUploader>);

    let err = Composer::new(&ctx)
        .send(SendMessageRequest::default().with_attachment(png(1024 * 1024 + 1)))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "UPLOAD_FAILED");
    assert_eq!(uploader.calls(), 0);
    assert!(log.log().is_empty(&LogPath::Messages));
}

#[tokio::test]
async fn test_media_only_message_is_sent() {
    let log = ControlledLog::new();
    let uploader = ScriptedUploader::succeeding("https://media.test/cat.png");
    let ctx = join_chat(log.backend(), "alice", test_config())
        .unwrap()
        .with_uploader(uploader.clone() as Arc<dyn MediaUploader>);

    let key = Composer::new(&ctx)
        .send(SendMessageRequest::default().with_attachment(png(64)))
        .await
        .unwrap();

    let stored = stored_message(log.log(), &key).unwrap();
    let media = stored.media.as_ref().unwrap();
    assert_eq!(media.url, "https://media.test/cat.png");
    assert_eq!(media.kind, MediaKind::Image);
    assert!(stored.body.is_none());
    assert_eq!(stored.preview(100), "[image]");
    assert_eq!(uploader.calls(), 1);
}

// ============================================================================
// Edit
// ============================================================================

#[tokio::test]
async fn test_edit_window_is_enforced_locally() {
    let log = ControlledLog::new();
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();
    let me = ctx.profile().unwrap();
    seed_authored(log.log(), &fixture_key(1), &me, "fresh", Duration::seconds(179));
    seed_authored(log.log(), &fixture_key(2), &me, "stale", Duration::seconds(181));
    seed_authored(log.log(), &fixture_key(3), &fixture_author(), "theirs", Duration::seconds(5));
    let composer = Composer::new(&ctx);

    assert!(composer.can_edit(&fixture_key(1)).await.unwrap());
    assert!(!composer.can_edit(&fixture_key(2)).await.unwrap());
    assert!(!composer.can_edit(&fixture_key(3)).await.unwrap());

    // With writes failing, only requests that passed local checks reach the backend
    log.fail_writes(WriteFailure::Denied);
    let err = composer.edit(&fixture_key(2), edit("late")).await.unwrap_err();
    assert_eq!(err.error_code(), "EDIT_WINDOW_EXPIRED");
    let err = composer.edit(&fixture_key(3), edit("mine now")).await.unwrap_err();
    assert_eq!(err.error_code(), "NOT_MESSAGE_AUTHOR");
    let err = composer.edit(&fixture_key(1), edit("in time")).await.unwrap_err();
    assert!(err.is_permission());

    log.heal_writes();
    composer.edit(&fixture_key(1), edit("in time")).await.unwrap();

    let edited = stored_message(log.log(), &fixture_key(1)).unwrap();
    assert_eq!(edited.body.as_deref(), Some("in time"));
    assert!(edited.is_edited());
    let untouched = stored_message(log.log(), &fixture_key(2)).unwrap();
    assert_eq!(untouched.body.as_deref(), Some("stale"));
    assert!(!untouched.is_edited());
}

#[tokio::test]
async fn test_denied_edit_leaves_window_unchanged() {
    let log = ControlledLog::new();
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();
    let me = ctx.profile().unwrap();
    seed_authored(log.log(), &fixture_key(1), &me, "before", Duration::seconds(1));
    ctx.engine().initialize(30).await.unwrap();

    log.fail_writes(WriteFailure::Denied);
    let err = Composer::new(&ctx)
        .edit(&fixture_key(1), edit("after"))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "PERMISSION_DENIED");
    let held = ctx.engine().get(&fixture_key(1)).unwrap();
    assert_eq!(held.body.as_deref(), Some("before"));
    assert!(!held.edited);
}

#[tokio::test]
async fn test_edit_rejects_deleted_message() {
    let log = ControlledLog::new();
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();
    let me = ctx.profile().unwrap();
    seed_authored(log.log(), &fixture_key(1), &me, "oops", Duration::seconds(1));
    let composer = Composer::new(&ctx);

    composer.delete(&fixture_key(1), DeleteMode::Soft).await.unwrap();
    let err = composer.edit(&fixture_key(1), edit("fixed")).await.unwrap_err();

    assert!(err.is_validation());
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_self_delete_keeps_shell() {
    let log = ControlledLog::new();
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();
    let me = ctx.profile().unwrap();
    seed_authored(log.log(), &fixture_key(1), &me, "regret", Duration::minutes(30));
    ctx.engine().initialize(30).await.unwrap();
    let composer = Composer::new(&ctx);

    let mode = composer.plan_delete(&fixture_key(1)).await.unwrap();
    assert_eq!(mode, DeleteMode::Soft);
    assert!(!mode.confirmation_prompt().is_empty());

    composer.delete(&fixture_key(1), mode).await.unwrap();

    let shell = stored_message(log.log(), &fixture_key(1)).unwrap();
    assert!(shell.is_shell());
    assert!(shell.body.is_none());
    assert_eq!(shell.author_id, me.id);

    let engine = ctx.engine();
    assert!(eventually(|| {
        engine
            .get(&fixture_key(1))
            .is_some_and(|message| message.deleted && message.visible_body().is_none())
    })
    .await);
}

#[tokio::test]
async fn test_moderator_delete_removes_entry() {
    let log = ControlledLog::new();
    seed_conversation(log.log(), 3);
    let ctx = join_moderator(log.backend(), "mod", test_config()).await.unwrap();
    ctx.engine().initialize(30).await.unwrap();
    let composer = Composer::new(&ctx);

    assert_eq!(
        composer.plan_delete(&fixture_key(2)).await.unwrap(),
        DeleteMode::Hard
    );
    composer.delete(&fixture_key(2), DeleteMode::Hard).await.unwrap();

    assert!(stored_message(log.log(), &fixture_key(2)).is_none());
    assert_eq!(log.log().len(&LogPath::Messages), 2);
    let engine = ctx.engine();
    assert!(eventually(|| engine.get(&fixture_key(2)).is_none()).await);
}

#[tokio::test]
async fn test_delete_confirmation_must_match_mode() {
    let log = ControlledLog::new();
    seed_conversation(log.log(), 1);
    let ctx = join_moderator(log.backend(), "mod", test_config()).await.unwrap();
    let me = ctx.profile().unwrap();
    seed_authored(log.log(), &fixture_key(2), &me, "own", Duration::seconds(1));
    let composer = Composer::new(&ctx);

    // A soft-delete prompt never authorizes removing someone else's message
    let err = composer
        .delete(&fixture_key(1), DeleteMode::Soft)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(stored_message(log.log(), &fixture_key(1)).is_some());

    // Moderators still soft-delete their own messages
    let err = composer
        .delete(&fixture_key(2), DeleteMode::Hard)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(
        composer.delete(&fixture_key(2), DeleteMode::Soft).await.unwrap(),
        DeleteMode::Soft
    );
    assert!(stored_message(log.log(), &fixture_key(2)).unwrap().deleted);
}

#[tokio::test]
async fn test_participant_cannot_delete_others() {
    let log = ControlledLog::new();
    seed_conversation(log.log(), 1);
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();
    let composer = Composer::new(&ctx);

    let err = composer.plan_delete(&fixture_key(1)).await.unwrap_err();
    assert_eq!(err.error_code(), "NOT_MESSAGE_AUTHOR");
    let err = composer
        .delete(&fixture_key(1), DeleteMode::Hard)
        .await
        .unwrap_err();
    assert!(err.is_authorization());

    let stored = stored_message(log.log(), &fixture_key(1)).unwrap();
    assert!(!stored.deleted);
    assert_eq!(stored.body.as_deref(), Some("message 1"));
}
