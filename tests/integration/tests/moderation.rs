//! Moderation and moderator profile tests
//!
//! Pinning, the report queue, elevation and override sync across devices.
//! Run with: cargo test -p integration-tests --test moderation

use std::sync::Arc;

use chat_common::PassphraseVerifier;
use chat_core::{LogPath, Profile};
use chat_store::MemoryProfileCache;
use chat_sync::dto::{OverrideRequest, SendMessageRequest};
use chat_sync::{Composer, DeleteMode, ModerationService, OverrideSave, ProfileStore};
use integration_tests::*;

fn nickname(name: &str, badge: &str) -> OverrideRequest {
    OverrideRequest {
        nickname: Some(name.to_string()),
        avatar: None,
        badge: Some(badge.to_string()),
    }
}

// ============================================================================
// Pinning
// ============================================================================

#[tokio::test]
async fn test_pin_replaces_and_unpin_clears() {
    let log = ControlledLog::new();
    seed_conversation(log.log(), 3);
    let moderator = join_moderator(log.backend(), "mod", test_config()).await.unwrap();
    let reader = join_chat(log.backend(), "reader", test_config()).unwrap();
    let service = ModerationService::new(&moderator);

    service.pin(&fixture_key(1)).await.unwrap();
    let pinned = service.pin(&fixture_key(2)).await.unwrap();
    assert_eq!(pinned.message_key, fixture_key(2));
    assert_eq!(pinned.preview, "message 2");
    assert_eq!(pinned.author_name, "Fixture Author");
    assert_eq!(pinned.pinned_by, moderator.profile().unwrap().id);
    assert_eq!(log.log().len(&LogPath::Pinned), 1);

    // Every participant reads the same slot
    let seen = ModerationService::new(&reader).pinned().await.unwrap();
    assert_eq!(seen.map(|p| p.message_key), Some(fixture_key(2)));

    service.unpin().await.unwrap();
    assert!(ModerationService::new(&reader).pinned().await.unwrap().is_none());
}

#[tokio::test]
async fn test_participant_cannot_pin() {
    let log = ControlledLog::new();
    seed_conversation(log.log(), 1);
    let reader = join_chat(log.backend(), "reader", test_config()).unwrap();
    let service = ModerationService::new(&reader);

    let err = service.pin(&fixture_key(1)).await.unwrap_err();
    assert_eq!(err.error_code(), "NOT_MODERATOR");
    let err = service.unpin().await.unwrap_err();
    assert!(err.is_authorization());
    assert!(log.log().is_empty(&LogPath::Pinned));
}

#[tokio::test]
async fn test_pin_unknown_message_fails() {
    let log = ControlledLog::new();
    let moderator = join_moderator(log.backend(), "mod", test_config()).await.unwrap();

    let err = ModerationService::new(&moderator)
        .pin(&fixture_key(4))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "UNKNOWN_MESSAGE");
    assert!(log.log().is_empty(&LogPath::Pinned));
}

// ============================================================================
// Reports
// ============================================================================

#[tokio::test]
async fn test_report_queue_roundtrip() {
    let log = ControlledLog::new();
    seed_conversation(log.log(), 2);
    let reader = join_chat(log.backend(), "reader", test_config()).unwrap();
    let moderator = join_moderator(log.backend(), "mod", test_config()).await.unwrap();

    let report_key = ModerationService::new(&reader)
        .report(&fixture_key(1))
        .await
        .unwrap();

    let err = ModerationService::new(&reader)
        .list_reports(10)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_MODERATOR");

    let service = ModerationService::new(&moderator);
    let reports = service.list_reports(10).await.unwrap();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.key, report_key);
    assert_eq!(report.message_key, fixture_key(1));
    assert_eq!(report.reporter_id, reader.profile().unwrap().id);
    assert_eq!(report.preview, "message 1");

    service.resolve(&report_key).await.unwrap();
    assert!(service.list_reports(10).await.unwrap().is_empty());
    assert!(stored_message(log.log(), &fixture_key(1)).is_some());
}

#[tokio::test]
async fn test_report_snapshot_survives_removal() {
    let log = ControlledLog::new();
    seed_conversation(log.log(), 1);
    let reader = join_chat(log.backend(), "reader", test_config()).unwrap();
    let moderator = join_moderator(log.backend(), "mod", test_config()).await.unwrap();

    ModerationService::new(&reader)
        .report(&fixture_key(1))
        .await
        .unwrap();
    Composer::new(&moderator)
        .delete(&fixture_key(1), DeleteMode::Hard)
        .await
        .unwrap();

    let reports = ModerationService::new(&moderator)
        .list_reports(10)
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].preview, "message 1");
    assert_eq!(reports[0].author_name, "Fixture Author");
}

#[tokio::test]
async fn test_malformed_reports_are_skipped() {
    let log = ControlledLog::new();
    seed_conversation(log.log(), 1);
    log.log().seed(
        &LogPath::Reports,
        fixture_key(900),
        serde_json::json!({"message_key": 7}),
    );
    let moderator = join_moderator(log.backend(), "mod", test_config()).await.unwrap();
    let service = ModerationService::new(&moderator);

    service.report(&fixture_key(1)).await.unwrap();

    let reports = service.list_reports(10).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].message_key, fixture_key(1));
}

// ============================================================================
// Elevation and Overrides
// ============================================================================

#[tokio::test]
async fn test_elevation_requires_passphrase() {
    let log = ControlledLog::new();
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();

    let err = ctx.profiles().elevate("open sesame").await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_PASSPHRASE");
    assert!(!ctx.profile().unwrap().is_moderator);

    let profile = ctx.profiles().elevate(TEST_PASSPHRASE).await.unwrap();
    assert!(profile.is_moderator);
    assert!(ctx.require_moderator().is_ok());
}

#[tokio::test]
async fn test_elevation_disabled_without_hash() {
    let log = ControlledLog::new();
    let mut config = test_config();
    config.moderation.passphrase_hash = None;
    let ctx = join_chat(log.backend(), "alice", config).unwrap();

    let err = ctx.profiles().elevate(TEST_PASSPHRASE).await.unwrap_err();
    assert_eq!(err.error_code(), "CONFIG_ERROR");
    assert!(!ctx.profile().unwrap().is_moderator);
}

#[tokio::test]
async fn test_override_falls_back_to_local_cache() {
    let log = ControlledLog::new();
    let ctx = join_moderator(log.backend(), "mod", test_config()).await.unwrap();

    log.fail_writes(WriteFailure::Unavailable);
    let saved = ctx
        .profiles()
        .save_override(nickname("Night Owl", "staff"))
        .await
        .unwrap();
    assert!(matches!(saved, OverrideSave::CachedLocallyOnly { .. }));
    assert!(!saved.is_remote());
    assert!(log.log().is_empty(&LogPath::ModeratorProfiles));

    // The override applies locally right away
    assert_eq!(ctx.profile().unwrap().effective_name(), "Night Owl");

    log.heal_writes();
    let saved = ctx
        .profiles()
        .save_override(nickname("Night Owl", "staff"))
        .await
        .unwrap();
    assert_eq!(saved, OverrideSave::PersistedRemotely);
    assert_eq!(log.log().len(&LogPath::ModeratorProfiles), 1);
}

#[tokio::test]
async fn test_override_snapshots_into_sent_messages() {
    let log = ControlledLog::new();
    let ctx = join_moderator(log.backend(), "mod", test_config()).await.unwrap();
    ctx.profiles()
        .save_override(nickname("Night Owl", "staff"))
        .await
        .unwrap();

    let key = Composer::new(&ctx)
        .send(SendMessageRequest::text("house rules apply"))
        .await
        .unwrap();

    let stored = stored_message(log.log(), &key).unwrap();
    assert_eq!(stored.author_name, "Night Owl");
    assert_eq!(stored.author_badge.as_deref(), Some("staff"));
    assert!(stored.author_is_moderator);
}

#[tokio::test]
async fn test_override_follows_moderator_to_new_device() {
    let log = ControlledLog::new();
    let first = join_moderator(log.backend(), "mod", test_config()).await.unwrap();
    first
        .profiles()
        .save_override(nickname("Night Owl", "staff"))
        .await
        .unwrap();
    let id = first.profile().unwrap().id;

    let config = test_config();
    let second = ProfileStore::new(
        log.backend(),
        Arc::new(MemoryProfileCache::new()),
        PassphraseVerifier::new(config.moderation.passphrase_hash.clone()),
    );
    second
        .bootstrap(Profile::new(id.clone(), "mod".to_string()))
        .await
        .unwrap();
    assert_eq!(second.current().unwrap().effective_name(), "mod");

    let profile = second.elevate(TEST_PASSPHRASE).await.unwrap();
    assert_eq!(profile.id, id);
    assert_eq!(profile.effective_name(), "Night Owl");
    assert_eq!(profile.effective_badge(), Some("staff"));
}

#[tokio::test]
async fn test_override_requires_moderator() {
    let log = ControlledLog::new();
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();

    let err = ctx
        .profiles()
        .save_override(nickname("Boss", "admin"))
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "NOT_MODERATOR");
    assert_eq!(ctx.profile().unwrap().effective_name(), "alice");
    assert!(log.log().is_empty(&LogPath::ModeratorProfiles));
}
