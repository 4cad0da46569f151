//! Room chat session tests
//!
//! Sessions are driven frame by frame, without sockets. Each connection's
//! outbox is inspected to see exactly what the server queued for it.

use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

use std::time::Duration;

use xfhub::backend::chat::{ChatWriters, MessageStore};
use xfhub::backend::error::{BackendError, StoreError};
use xfhub::shared::config::BatchPolicy;
use xfhub::shared::{Message, RoomEvent, RoomOutbound};

use crate::common::{frames, RoomWorld};
use crate::{assert_contains, assert_err, assert_silent};

fn new_message(text: &str) -> String {
    json!({ "type": "new_message", "message": text, "full_name": "Ada", "avatar": "ada.png" }).to_string()
}

fn only_new_message(outbound: Vec<RoomOutbound>) -> Message {
    match outbound.as_slice() {
        [RoomOutbound::NewMessage { message }] => message.clone(),
        other => panic!("Expected one NewMessage, got {:?}", other),
    }
}

#[tokio::test]
async fn test_new_message_reaches_everyone_including_sender() {
    let world = RoomWorld::new(true);
    let (alice, mut alice_out) = world.connect();
    let (_bob, mut bob_out) = world.connect();

    alice.handle_frame(&new_message("hello room")).await;

    let seen_by_alice = only_new_message(frames(&mut alice_out));
    let seen_by_bob = only_new_message(frames(&mut bob_out));
    assert_eq!(seen_by_alice, seen_by_bob);
    assert_eq!(seen_by_bob.message, "hello room");
    assert_eq!(seen_by_bob.full_name, "Ada");
    assert_eq!(seen_by_bob.user_id, alice.user.user_id);
    assert_eq!(seen_by_bob.room_id, world.room_id);
}

#[tokio::test]
async fn test_new_message_is_buffered_until_flush() {
    let world = RoomWorld::new(true);
    let (alice, _alice_out) = world.connect();

    alice.handle_frame(&new_message("one")).await;
    alice.handle_frame(&new_message("two")).await;

    let writer = world.writers.messages(world.tenant_id, &world.dyn_store());
    assert_eq!(writer.pending(), 2);
    assert_eq!(world.store.message_count(), 0);

    world.flush().await;
    assert_eq!(world.store.message_count(), 2);
    assert_eq!(world.store.batches(), 1);
}

#[tokio::test]
async fn test_client_supplied_id_is_kept() {
    let world = RoomWorld::new(true);
    let (alice, mut alice_out) = world.connect();
    let id = Uuid::new_v4();

    alice
        .handle_frame(&json!({ "type": "new_message", "id": id, "message": "optimistic" }).to_string())
        .await;
    world.flush().await;

    assert_eq!(only_new_message(frames(&mut alice_out)).id, id);
    assert!(world.store.stored(id).is_some());
}

#[tokio::test]
async fn test_edit_right_after_send_sees_the_message() {
    let world = RoomWorld::new(true);
    let (alice, mut alice_out) = world.connect();
    let (_bob, mut bob_out) = world.connect();

    alice.handle_frame(&new_message("typo")).await;
    let id = only_new_message(frames(&mut alice_out)).id;
    frames::<RoomOutbound>(&mut bob_out);

    alice
        .handle_frame(&json!({ "type": "edit_message", "id": id, "message": "fixed" }).to_string())
        .await;

    match frames::<RoomOutbound>(&mut bob_out).as_slice() {
        [RoomOutbound::MessageEdited { message }] => {
            assert_eq!(message.id, id);
            assert_eq!(message.message, "fixed");
            assert!(message.edited_at.is_some());
        }
        other => panic!("Expected MessageEdited, got {:?}", other),
    }
    assert_eq!(world.store.stored(id).unwrap().message, "fixed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_edit_waits_for_batch_already_being_written() {
    let mut world = RoomWorld::new(true);
    world.writers = ChatWriters::new(
        BatchPolicy::new(Duration::from_secs(3600), 1),
        BatchPolicy::new(Duration::from_secs(3600), 50),
        true,
    );
    world.store.set_insert_delay(Duration::from_millis(200));
    let (alice, mut alice_out) = world.connect();

    alice.handle_frame(&new_message("first")).await;
    alice.handle_frame(&new_message("second")).await;
    let sent = frames::<RoomOutbound>(&mut alice_out);
    let second = match sent.as_slice() {
        [_, RoomOutbound::NewMessage { message }] => message.id,
        other => panic!("Expected two NewMessage frames, got {:?}", other),
    };

    // The threshold flush has taken both messages and is still writing
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(world.writers.messages(world.tenant_id, &world.dyn_store()).pending(), 0);

    alice
        .handle_frame(&json!({ "type": "edit_message", "id": second, "message": "second, fixed" }).to_string())
        .await;

    match frames::<RoomOutbound>(&mut alice_out).as_slice() {
        [RoomOutbound::MessageEdited { message }] => assert_eq!(message.message, "second, fixed"),
        other => panic!("Expected MessageEdited, got {:?}", other),
    }
    assert_eq!(world.store.stored(second).unwrap().message, "second, fixed");
}

#[tokio::test]
async fn test_edit_by_someone_else_is_rejected() {
    let world = RoomWorld::new(true);
    let (alice, _alice_out) = world.connect();
    let (bob, mut bob_out) = world.connect();
    let id = world.store.seed(world.room_id, alice.user.user_id, "mine");

    let result = bob
        .dispatch(RoomEvent::EditMessage {
            id,
            message: "yours now".into(),
        })
        .await;

    match result {
        Err(err @ BackendError::Store(StoreError::Forbidden { .. })) => assert!(err.is_client_error()),
        other => panic!("Expected Forbidden, got {:?}", other.map(|_| ())),
    }
    assert_eq!(world.store.stored(id).unwrap().message, "mine");
    assert_silent!(bob_out);
}

#[tokio::test]
async fn test_delete_in_another_room_is_not_found() {
    let world = RoomWorld::new(true);
    let (alice, _alice_out) = world.connect();
    let elsewhere = world.store.seed(Uuid::new_v4(), alice.user.user_id, "other room");

    let result = alice.dispatch(RoomEvent::DeleteMessage { id: elsewhere }).await;

    assert_err!(result, BackendError::Store(StoreError::NotFound { .. }));
    assert!(world.store.stored(elsewhere).is_some());
}

#[tokio::test]
async fn test_delete_broadcasts_and_removes_attachments() {
    let world = RoomWorld::new(true);
    let (alice, mut alice_out) = world.connect();
    let (_bob, mut bob_out) = world.connect();
    let id = world.store.seed(world.room_id, alice.user.user_id, "with pictures");
    world.store.attach(id, "https://cdn.example.com/a.png");
    world.store.attach(id, "https://cdn.example.com/b.png");

    alice
        .handle_frame(&json!({ "type": "delete_message", "id": id }).to_string())
        .await;

    for outbox in [&mut alice_out, &mut bob_out] {
        assert_eq!(frames::<RoomOutbound>(outbox), vec![RoomOutbound::MessageDeleted { id }]);
    }
    assert!(world.store.stored(id).is_none());
    assert_eq!(
        world.media.removed(),
        vec!["https://cdn.example.com/a.png", "https://cdn.example.com/b.png"]
    );
}

#[tokio::test]
async fn test_reaction_flushed_immediately_carries_full_list() {
    let world = RoomWorld::new(true);
    let (alice, mut alice_out) = world.connect();
    let (bob, mut bob_out) = world.connect();

    alice.handle_frame(&new_message("react to me")).await;
    let id = only_new_message(frames(&mut alice_out)).id;
    frames::<RoomOutbound>(&mut bob_out);

    bob.handle_frame(&json!({ "type": "add_reaction", "message_id": id, "emoji": "👍" }).to_string())
        .await;

    match frames::<RoomOutbound>(&mut alice_out).as_slice() {
        [RoomOutbound::MessageReactionsUpdated { message_id, reactions }] => {
            assert_eq!(*message_id, id);
            assert_eq!(reactions.len(), 1);
            assert_eq!(reactions[0].user_id, bob.user.user_id);
            assert_eq!(reactions[0].emoji, "👍");
        }
        other => panic!("Expected MessageReactionsUpdated, got {:?}", other),
    }

    // Same emoji again toggles it off
    bob.handle_frame(&json!({ "type": "add_reaction", "message_id": id, "emoji": "👍" }).to_string())
        .await;
    match frames::<RoomOutbound>(&mut bob_out).last() {
        Some(RoomOutbound::MessageReactionsUpdated { reactions, .. }) => assert!(reactions.is_empty()),
        other => panic!("Expected MessageReactionsUpdated, got {:?}", other),
    }
}

#[tokio::test]
async fn test_deferred_reaction_is_broadcast_as_toggle() {
    let world = RoomWorld::new(false);
    let (alice, mut alice_out) = world.connect();
    let id = world.store.seed(world.room_id, alice.user.user_id, "hi");

    alice
        .dispatch(RoomEvent::AddReaction {
            message_id: id,
            emoji: "🎉".into(),
        })
        .await
        .unwrap();

    assert_eq!(
        frames::<RoomOutbound>(&mut alice_out),
        vec![RoomOutbound::MessageReactionToggled {
            message_id: id,
            user_id: alice.user.user_id,
            emoji: "🎉".into(),
        }]
    );
    assert!(world.store.reactions(id).await.unwrap().is_empty());

    world.flush().await;
    assert_eq!(world.store.reactions(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_load_more_answers_only_the_requester() {
    let world = RoomWorld::new(true);
    let (alice, mut alice_out) = world.connect();
    let (_bob, mut bob_out) = world.connect();
    let ids: Vec<Uuid> = (0..5)
        .map(|n| world.store.seed(world.room_id, alice.user.user_id, &format!("m{}", n)))
        .collect();

    alice
        .handle_frame(&json!({ "type": "load_more_messages", "before": ids[4], "limit": 2 }).to_string())
        .await;

    match frames::<RoomOutbound>(&mut alice_out).as_slice() {
        [RoomOutbound::MessagesBatch { messages }] => {
            let got: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
            assert_eq!(got, vec![ids[2], ids[3]]);
        }
        other => panic!("Expected MessagesBatch, got {:?}", other),
    }
    assert_silent!(bob_out);
}

#[tokio::test]
async fn test_page_size_is_clamped() {
    let world = RoomWorld::new(true);
    let (alice, mut alice_out) = world.connect();
    for n in 0..3 {
        world.store.seed(world.room_id, alice.user.user_id, &format!("m{}", n));
    }

    alice
        .dispatch(RoomEvent::LoadMoreMessages {
            before: None,
            limit: Some(0),
        })
        .await
        .unwrap();

    match frames::<RoomOutbound>(&mut alice_out).as_slice() {
        [RoomOutbound::MessagesBatch { messages }] => assert_eq!(messages.len(), 1),
        other => panic!("Expected MessagesBatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_typing_is_relayed_to_the_room() {
    let world = RoomWorld::new(true);
    let (alice, mut alice_out) = world.connect();
    let (_bob, mut bob_out) = world.connect();

    alice.handle_frame(r#"{"type":"user_typing"}"#).await;

    let expected = RoomOutbound::UserTyping {
        user_id: alice.user.user_id,
        room_id: world.room_id,
    };
    assert_eq!(frames::<RoomOutbound>(&mut bob_out), vec![expected.clone()]);
    assert_eq!(frames::<RoomOutbound>(&mut alice_out), vec![expected]);
}

#[tokio::test]
async fn test_update_rebroadcasts_current_state() {
    let world = RoomWorld::new(true);
    let (alice, _alice_out) = world.connect();
    let (_bob, mut bob_out) = world.connect();
    let id = world.store.seed(world.room_id, alice.user.user_id, "photo");
    world.store.attach(id, "https://cdn.example.com/late.png");

    alice
        .handle_frame(&json!({ "type": "update_message", "id": id }).to_string())
        .await;

    match frames::<RoomOutbound>(&mut bob_out).as_slice() {
        [RoomOutbound::MessageUpdated { message }] => {
            assert_eq!(message.content_url, vec!["https://cdn.example.com/late.png"]);
        }
        other => panic!("Expected MessageUpdated, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bad_frames_do_not_end_the_session() {
    let world = RoomWorld::new(true);
    let (alice, mut alice_out) = world.connect();

    alice.handle_frame("not json").await;
    alice.handle_frame(r#"{"type":"new_message","message":"   "}"#).await;
    alice.handle_frame(r#"{"type":"pin_message"}"#).await;
    alice.handle_frame(r#"{"type":"edit_message","id":"nope","message":"x"}"#).await;
    assert_silent!(alice_out);

    alice.handle_frame(&new_message("still here")).await;
    assert_eq!(only_new_message(frames(&mut alice_out)).message, "still here");
}

#[tokio::test]
async fn test_slow_connection_is_pruned() {
    let world = RoomWorld::new(true);
    let (alice, mut alice_out) = world.connect();
    let (slow, _slow_out) = world.connect_with_capacity(1);

    alice.handle_frame(&new_message("one")).await;
    alice.handle_frame(&new_message("two")).await;

    assert!(slow.peer.is_closed());
    assert_eq!(world.hub.members(alice.room()), vec![alice.peer.id()]);
    assert_eq!(frames::<RoomOutbound>(&mut alice_out).len(), 2);
}

#[tokio::test]
async fn test_history_is_a_bare_array_oldest_first() {
    let world = RoomWorld::new(true);
    let (alice, mut alice_out) = world.connect();
    let first = world.store.seed(world.room_id, alice.user.user_id, "first");
    let second = world.store.seed(world.room_id, alice.user.user_id, "second");

    alice.send_history().await.unwrap();

    let raw = alice_out.drain_text();
    assert_eq!(raw.len(), 1);
    assert!(raw[0].starts_with('['));
    let history: Vec<Message> = serde_json::from_str(&raw[0]).unwrap();
    let ids: Vec<Uuid> = history.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![first, second]);
}

#[tokio::test]
async fn test_tenants_do_not_share_rooms() {
    let acme = RoomWorld::new(true);
    let mut globex = RoomWorld::new(true);
    // Same room id, same hub, different tenant
    globex.room_id = acme.room_id;
    globex.hub = acme.hub.clone();

    let (alice, _alice_out) = acme.connect();
    let (_mallory, mut mallory_out) = globex.connect();

    alice.handle_frame(&new_message("acme only")).await;

    assert_silent!(mallory_out);
    assert_eq!(acme.hub.room_count(), 2);
}

#[tokio::test]
async fn test_writers_are_per_tenant() {
    let acme = RoomWorld::new(true);
    let mut globex = RoomWorld::new(true);
    globex.writers = acme.writers.clone();

    let (alice, _a) = acme.connect();
    let (bob, _b) = globex.connect();
    alice.handle_frame(&new_message("a")).await;
    bob.handle_frame(&new_message("b")).await;

    acme.flush().await;
    assert_eq!(acme.store.message_count(), 1);
    assert_eq!(globex.store.message_count(), 0);

    globex.flush().await;
    assert_eq!(globex.store.message_count(), 1);
}

#[tokio::test]
async fn test_failed_flush_drops_the_batch() {
    let world = RoomWorld::new(true);
    let (alice, mut alice_out) = world.connect();
    world.store.fail_inserts(true);

    alice.handle_frame(&new_message("lost")).await;
    let broadcast = alice_out.drain_text().join("\n");
    assert_contains!(broadcast, "lost");

    world.flush().await;
    let writer = world.writers.messages(world.tenant_id, &world.dyn_store());
    assert_eq!(writer.pending(), 0);
    assert_eq!(world.store.message_count(), 0);

    world.store.fail_inserts(false);
    world.flush().await;
    assert_eq!(world.store.message_count(), 0);
}
