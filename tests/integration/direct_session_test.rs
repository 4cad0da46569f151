//! Direct messaging session tests

use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

use xfhub::shared::messaging::{ConversationHistory, DirectEvent, DirectOutbound};

use crate::assert_silent;
use crate::common::{frames, user, DirectWorld};

fn send(to: Uuid, text: &str) -> String {
    json!({ "type": "new_message", "to": to, "text": text }).to_string()
}

#[tokio::test]
async fn test_new_message_goes_to_the_recipient_only() {
    let world = DirectWorld::new();
    let (alice, mut alice_out) = world.connect(user());
    let (bob, mut bob_out) = world.connect(user());
    let (_carol, mut carol_out) = world.connect(user());

    alice.handle_frame(&send(bob.user.user_id, "hi bob")).await;

    match frames::<DirectOutbound>(&mut bob_out).as_slice() {
        [DirectOutbound::NewMessage { message }] => {
            assert_eq!(message.text, "hi bob");
            assert_eq!(message.sender_id, alice.user.user_id);
        }
        other => panic!("Expected NewMessage, got {:?}", other),
    }
    assert_silent!(alice_out);
    assert_silent!(carol_out);
    assert_eq!(world.store.message_count(), 1);
}

#[tokio::test]
async fn test_message_to_offline_user_is_stored() {
    let world = DirectWorld::new();
    let (alice, mut alice_out) = world.connect(user());
    let offline = Uuid::new_v4();

    alice.handle_frame(&send(offline, "see you later")).await;

    assert_silent!(alice_out);
    assert_eq!(world.store.message_count(), 1);
    assert!(!world.hub.is_online(world.tenant_id, offline));
}

#[tokio::test]
async fn test_conversation_is_reused_in_both_directions() {
    let world = DirectWorld::new();
    let (alice, _alice_out) = world.connect(user());
    let (bob, _bob_out) = world.connect(user());

    alice.handle_frame(&send(bob.user.user_id, "one")).await;
    bob.handle_frame(&send(alice.user.user_id, "two")).await;
    alice.handle_frame(&send(bob.user.user_id, "three")).await;

    assert_eq!(world.store.conversation_count(), 1);
    assert_eq!(world.store.message_count(), 3);
}

#[tokio::test]
async fn test_reversed_legacy_pair_is_found() {
    let world = DirectWorld::new();
    let (alice, _alice_out) = world.connect(user());
    let (bob, mut bob_out) = world.connect(user());
    let (high, low) = if alice.user.user_id > bob.user.user_id {
        (alice.user.user_id, bob.user.user_id)
    } else {
        (bob.user.user_id, alice.user.user_id)
    };
    let legacy = world.store.seed_conversation(high, low);

    alice.handle_frame(&send(bob.user.user_id, "old thread")).await;

    assert_eq!(world.store.conversation_count(), 1);
    match frames::<DirectOutbound>(&mut bob_out).as_slice() {
        [DirectOutbound::NewMessage { message }] => assert_eq!(message.conversation_id, legacy.id),
        other => panic!("Expected NewMessage, got {:?}", other),
    }
}

#[tokio::test]
async fn test_typing_and_read_receipts_skip_the_sender() {
    let world = DirectWorld::new();
    let (alice, mut alice_out) = world.connect(user());
    let (bob, mut bob_out) = world.connect(user());
    let message_id = Uuid::new_v4();

    alice
        .handle_frame(&json!({ "type": "user_typing", "to": bob.user.user_id }).to_string())
        .await;
    alice
        .handle_frame(&json!({ "type": "mark_read", "to": bob.user.user_id, "message_id": message_id }).to_string())
        .await;

    assert_eq!(
        frames::<DirectOutbound>(&mut bob_out),
        vec![
            DirectOutbound::UserTyping { from: alice.user.user_id },
            DirectOutbound::MessageRead {
                from: alice.user.user_id,
                message_id,
            },
        ]
    );
    assert_silent!(alice_out);
    assert_eq!(world.store.message_count(), 0);
}

#[tokio::test]
async fn test_edit_and_delete_reach_both_participants() {
    let world = DirectWorld::new();
    let (alice, mut alice_out) = world.connect(user());
    let (bob, mut bob_out) = world.connect(user());

    alice.handle_frame(&send(bob.user.user_id, "draft")).await;
    let message = match frames::<DirectOutbound>(&mut bob_out).pop() {
        Some(DirectOutbound::NewMessage { message }) => message,
        other => panic!("Expected NewMessage, got {:?}", other),
    };
    world.store.attach(message.id, "https://cdn.example.com/doc.pdf");

    alice
        .dispatch(DirectEvent::EditMessage {
            id: message.id,
            text: "final".into(),
        })
        .await
        .unwrap();
    for outbox in [&mut alice_out, &mut bob_out] {
        match frames::<DirectOutbound>(outbox).as_slice() {
            [DirectOutbound::MessageEdited { message: edited }] => {
                assert_eq!(edited.text, "final");
                assert!(edited.edited_at.is_some());
            }
            other => panic!("Expected MessageEdited, got {:?}", other),
        }
    }

    alice.dispatch(DirectEvent::DeleteMessage { id: message.id }).await.unwrap();
    let expected = DirectOutbound::MessageDeleted {
        id: message.id,
        conversation_id: message.conversation_id,
    };
    assert_eq!(frames::<DirectOutbound>(&mut alice_out), vec![expected.clone()]);
    assert_eq!(frames::<DirectOutbound>(&mut bob_out), vec![expected]);
    assert_eq!(world.media.removed(), vec!["https://cdn.example.com/doc.pdf"]);
}

#[tokio::test]
async fn test_only_the_sender_may_edit() {
    let world = DirectWorld::new();
    let (alice, _alice_out) = world.connect(user());
    let (bob, mut bob_out) = world.connect(user());

    alice.handle_frame(&send(bob.user.user_id, "mine")).await;
    let id = match frames::<DirectOutbound>(&mut bob_out).pop() {
        Some(DirectOutbound::NewMessage { message }) => message.id,
        other => panic!("Expected NewMessage, got {:?}", other),
    };

    let result = bob
        .dispatch(DirectEvent::EditMessage {
            id,
            text: "hijacked".into(),
        })
        .await;

    match result {
        Err(err) => assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN),
        Ok(()) => panic!("Expected Forbidden"),
    }
}

#[tokio::test]
async fn test_newer_connection_replaces_older() {
    let world = DirectWorld::new();
    let alice = user();
    let (first, _first_out) = world.connect(alice.clone());
    let (second, mut second_out) = world.connect(alice.clone());
    let (bob, _bob_out) = world.connect(user());

    assert!(first.peer.is_closed());

    // The old connection tearing down must not unregister the new one
    assert!(!world.hub.unregister(world.tenant_id, alice.user_id, first.peer.id()));
    assert!(world.hub.is_online(world.tenant_id, alice.user_id));

    bob.handle_frame(&send(alice.user_id, "which tab?")).await;
    assert_eq!(frames::<DirectOutbound>(&mut second_out).len(), 1);

    assert!(world.hub.unregister(world.tenant_id, alice.user_id, second.peer.id()));
    assert!(!world.hub.is_online(world.tenant_id, alice.user_id));
}

#[tokio::test]
async fn test_load_more_without_conversation_is_empty() {
    let world = DirectWorld::new();
    let (alice, mut alice_out) = world.connect(user());
    let stranger = Uuid::new_v4();

    alice
        .handle_frame(&json!({ "type": "load_more_messages", "with": stranger }).to_string())
        .await;

    assert_eq!(
        frames::<DirectOutbound>(&mut alice_out),
        vec![DirectOutbound::MessagesBatch {
            with: stranger,
            messages: vec![],
        }]
    );
}

#[tokio::test]
async fn test_load_more_pages_backwards() {
    let world = DirectWorld::new();
    let (alice, mut alice_out) = world.connect(user());
    let (bob, mut bob_out) = world.connect(user());
    for n in 0..4 {
        alice.handle_frame(&send(bob.user.user_id, &format!("m{}", n))).await;
    }
    let sent: Vec<Uuid> = frames::<DirectOutbound>(&mut bob_out)
        .into_iter()
        .map(|event| match event {
            DirectOutbound::NewMessage { message } => message.id,
            other => panic!("Expected NewMessage, got {:?}", other),
        })
        .collect();

    alice
        .dispatch(DirectEvent::LoadMoreMessages {
            with: bob.user.user_id,
            before: Some(sent[3]),
            limit: Some(2),
        })
        .await
        .unwrap();

    match frames::<DirectOutbound>(&mut alice_out).as_slice() {
        [DirectOutbound::MessagesBatch { with, messages }] => {
            assert_eq!(*with, bob.user.user_id);
            let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
            assert_eq!(ids, vec![sent[1], sent[2]]);
        }
        other => panic!("Expected MessagesBatch, got {:?}", other),
    }
    assert_silent!(bob_out);
}

#[tokio::test]
async fn test_self_addressed_frames_are_dropped() {
    let world = DirectWorld::new();
    let (alice, mut alice_out) = world.connect(user());

    alice.handle_frame(&send(alice.user.user_id, "note to self")).await;
    alice
        .handle_frame(&json!({ "type": "user_typing", "to": alice.user.user_id }).to_string())
        .await;

    assert_silent!(alice_out);
    assert_eq!(world.store.message_count(), 0);
}

#[tokio::test]
async fn test_history_lists_every_conversation() {
    let world = DirectWorld::new();
    let (alice, mut alice_out) = world.connect(user());
    let (bob, _bob_out) = world.connect(user());
    let (carol, _carol_out) = world.connect(user());

    alice.handle_frame(&send(bob.user.user_id, "hi bob")).await;
    carol.handle_frame(&send(alice.user.user_id, "hi alice")).await;
    alice_out.drain_text();

    alice.send_history().await.unwrap();

    let raw = alice_out.drain_text();
    assert_eq!(raw.len(), 1);
    let history: Vec<ConversationHistory> = serde_json::from_str(&raw[0]).unwrap();
    let mut partners: Vec<Uuid> = history.iter().map(|entry| entry.with).collect();
    partners.sort();
    let mut expected = vec![bob.user.user_id, carol.user.user_id];
    expected.sort();
    assert_eq!(partners, expected);
    assert!(history.iter().all(|entry| entry.messages.len() == 1));
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let acme = DirectWorld::new();
    let mut globex = DirectWorld::new();
    globex.hub = acme.hub.clone();

    let shared_user = user();
    let (_in_acme, mut acme_out) = acme.connect(shared_user.clone());
    let (_in_globex, mut globex_out) = globex.connect(shared_user.clone());
    let (sender, _sender_out) = acme.connect(user());

    sender.handle_frame(&send(shared_user.user_id, "acme news")).await;

    assert_eq!(frames::<DirectOutbound>(&mut acme_out).len(), 1);
    assert_silent!(globex_out);
}
