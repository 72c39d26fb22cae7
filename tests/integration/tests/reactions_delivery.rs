//! Reaction and delivery tracking tests
//!
//! Several participants share one log. Run with:
//! cargo test -p integration-tests --test reactions_delivery

use chat_core::{DeliveryStatus, LogBackend, LogPath, ReactionCount};
use chat_sync::dto::{ReactionRequest, SendMessageRequest};
use chat_sync::{ChatContext, Composer, DeliveryTracker, ReactionService, ToggleOutcome};
use chrono::Duration;
use integration_tests::*;

async fn react(ctx: &ChatContext, n: usize, symbol: &str) -> ToggleOutcome {
    ReactionService::new(ctx)
        .toggle(&fixture_key(n), ReactionRequest::new(symbol))
        .await
        .unwrap()
}

// ============================================================================
// Reactions
// ============================================================================

#[tokio::test]
async fn test_toggle_twice_restores_stored_entry() {
    let log = ControlledLog::new();
    seed_conversation(log.log(), 1);
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();
    let backend = log.backend();
    let before = backend
        .get(&LogPath::Messages, &fixture_key(1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(react(&ctx, 1, "👍").await, ToggleOutcome::Added);
    let reacted = stored_message(log.log(), &fixture_key(1)).unwrap();
    assert!(reacted.reactions.contains("👍", &ctx.profile().unwrap().id));
    assert_eq!(reacted.reactions.total(), 1);

    assert_eq!(react(&ctx, 1, "👍").await, ToggleOutcome::Removed);
    let after = backend
        .get(&LogPath::Messages, &fixture_key(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_concurrent_toggles_by_different_users() {
    let log = ControlledLog::new();
    seed_conversation(log.log(), 1);
    let alice = join_chat(log.backend(), "alice", test_config()).unwrap();
    let bob = join_chat(log.backend(), "bob", test_config()).unwrap();

    let (a, b) = tokio::join!(react(&alice, 1, "🔥"), react(&bob, 1, "🔥"));
    assert_eq!(a, ToggleOutcome::Added);
    assert_eq!(b, ToggleOutcome::Added);

    let stored = stored_message(log.log(), &fixture_key(1)).unwrap();
    assert_eq!(stored.reactions.count("🔥"), 2);

    // Bob withdrawing leaves Alice's reaction alone
    assert_eq!(react(&bob, 1, "🔥").await, ToggleOutcome::Removed);
    let stored = stored_message(log.log(), &fixture_key(1)).unwrap();
    assert_eq!(stored.reactions.count("🔥"), 1);
    assert!(stored.reactions.contains("🔥", &alice.profile().unwrap().id));
}

#[tokio::test]
async fn test_toggle_reads_stored_membership() {
    let log = ControlledLog::new();
    seed_conversation(log.log(), 1);
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();
    let me = ctx.profile().unwrap().id;

    // Another device of the same user already reacted
    log.backend()
        .update(
            &LogPath::Messages,
            &fixture_key(1),
            &chat_core::Message::reaction_patch("👀", &me, true),
        )
        .await
        .unwrap();

    assert_eq!(react(&ctx, 1, "👀").await, ToggleOutcome::Removed);
    let stored = stored_message(log.log(), &fixture_key(1)).unwrap();
    assert!(stored.reactions.is_empty());
}

#[tokio::test]
async fn test_summary_shows_top_three() {
    let log = ControlledLog::new();
    seed_conversation(log.log(), 1);
    let alice = join_chat(log.backend(), "alice", test_config()).unwrap();
    let bob = join_chat(log.backend(), "bob", test_config()).unwrap();
    let carol = join_chat(log.backend(), "carol", test_config()).unwrap();

    for ctx in [&alice, &bob, &carol] {
        react(ctx, 1, "👍").await;
    }
    for ctx in [&bob, &carol] {
        react(ctx, 1, "❤").await;
    }
    react(&alice, 1, "🎉").await;
    react(&carol, 1, "😂").await;

    let summary = ReactionService::new(&alice)
        .summary(&fixture_key(1))
        .await
        .unwrap();

    assert_eq!(summary.total, 7);
    assert_eq!(
        summary.top,
        vec![
            ReactionCount {
                symbol: "👍".to_string(),
                count: 3,
                me: true,
            },
            ReactionCount {
                symbol: "❤".to_string(),
                count: 2,
                me: false,
            },
            ReactionCount {
                symbol: "🎉".to_string(),
                count: 1,
                me: true,
            },
        ]
    );
}

#[tokio::test]
async fn test_toggle_rejects_bad_input() {
    let log = ControlledLog::new();
    seed_conversation(log.log(), 1);
    let ctx = join_chat(log.backend(), "alice", test_config()).unwrap();
    let service = ReactionService::new(&ctx);

    let err = service
        .toggle(&fixture_key(1), ReactionRequest::new("a/b"))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = service
        .toggle(&fixture_key(7), ReactionRequest::new("👍"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "UNKNOWN_MESSAGE");

    assert!(stored_message(log.log(), &fixture_key(1))
        .unwrap()
        .reactions
        .is_empty());
}

// ============================================================================
// Delivery
// ============================================================================

#[tokio::test]
async fn test_focused_reader_marks_message_seen() {
    let log = ControlledLog::new();
    let alice = join_chat(log.backend(), "alice", test_config()).unwrap();
    let bob = join_chat(log.backend(), "bob", test_config()).unwrap();
    alice.engine().initialize(30).await.unwrap();

    let key = Composer::new(&alice)
        .send(SendMessageRequest::text("are you there?"))
        .await
        .unwrap();
    let tracker = DeliveryTracker::new(&alice);
    assert!(eventually(|| tracker.status(&key) == Some(DeliveryStatus::Sent)).await);

    // Alice's own view never marks her message
    assert_eq!(tracker.mark_visible().await.unwrap(), 0);

    bob.engine().initialize(30).await.unwrap();
    assert_eq!(bob.engine().set_focused(true).await.unwrap(), 1);

    assert!(eventually(|| tracker.status(&key) == Some(DeliveryStatus::Seen)).await);
    let stored = stored_message(log.log(), &key).unwrap();
    let bob_id = bob.profile().unwrap().id;
    assert_eq!(stored.seen_by.get(&bob_id).map(String::as_str), Some("bob"));
    assert_eq!(stored.seen_by.len(), 1);
}

#[tokio::test]
async fn test_mark_visible_skips_shells_and_repeats() {
    let log = ControlledLog::new();
    seed_conversation(log.log(), 4);
    let reader = join_chat(log.backend(), "reader", test_config()).unwrap();
    let me = reader.profile().unwrap();
    seed_authored(log.log(), &fixture_key(5), &me, "mine", Duration::seconds(1));

    // The fixture author soft-deletes m002
    log.backend()
        .update(
            &LogPath::Messages,
            &fixture_key(2),
            &chat_core::Message::soft_delete_patch(),
        )
        .await
        .unwrap();

    reader.engine().initialize(30).await.unwrap();
    let tracker = DeliveryTracker::new(&reader);

    assert_eq!(tracker.mark_visible().await.unwrap(), 3);
    for n in [1, 3, 4] {
        let stored = stored_message(log.log(), &fixture_key(n)).unwrap();
        assert!(stored.is_seen_by(&me.id));
    }
    assert!(!stored_message(log.log(), &fixture_key(2))
        .unwrap()
        .is_seen_by(&me.id));
    assert!(!stored_message(log.log(), &fixture_key(5))
        .unwrap()
        .is_seen_by(&me.id));

    let engine = reader.engine();
    assert!(eventually(|| {
        engine
            .get(&fixture_key(4))
            .is_some_and(|message| message.is_seen_by(&me.id))
    })
    .await);
    assert_eq!(tracker.mark_visible().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unfocused_reader_does_not_mark() {
    let log = ControlledLog::new();
    let alice = join_chat(log.backend(), "alice", test_config()).unwrap();
    let bob = join_chat(log.backend(), "bob", test_config()).unwrap();
    bob.engine().initialize(30).await.unwrap();

    let key = Composer::new(&alice)
        .send(SendMessageRequest::text("ping"))
        .await
        .unwrap();

    let engine = bob.engine();
    assert!(eventually(|| engine.unread_count() == 1).await);
    assert!(stored_message(log.log(), &key).unwrap().seen_by.is_empty());

    assert_eq!(engine.set_focused(true).await.unwrap(), 1);
    assert_eq!(engine.unread_count(), 0);
    assert!(!stored_message(log.log(), &key).unwrap().seen_by.is_empty());

    // Later arrivals are marked as they land while focused
    let second = Composer::new(&alice)
        .send(SendMessageRequest::text("pong"))
        .await
        .unwrap();
    assert!(eventually(|| {
        stored_message(log.log(), &second).is_some_and(|message| !message.seen_by.is_empty())
    })
    .await);
    assert_eq!(engine.unread_count(), 0);
}
