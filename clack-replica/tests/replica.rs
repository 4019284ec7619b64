use chrono::{Duration, TimeZone, Utc};
use clack_core::{
    wire::{DirectMessage, Room, RoomMessage, User},
    ConversationKey, Patch, PatchPath,
};
use clack_replica::{Replica, ReplicaEvent};
use serde_json::{json, to_value};

fn user(id: i64, username: &str) -> User {
    User {
        id,
        username: username.into(),
        created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    }
}

fn room(id: i64, name: &str, owner_id: i64, member_count: u32) -> Room {
    Room {
        id,
        name: name.into(),
        description: String::new(),
        owner_id,
        owner_username: String::new(),
        created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        member_count,
    }
}

fn direct(id: i64, sender_id: i64, content: &str) -> DirectMessage {
    DirectMessage {
        id,
        user_a: 1,
        user_b: 2,
        sender_id,
        sender_name: String::new(),
        content: content.into(),
        created_at: Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
        client_message_id: None,
    }
}

fn seeded() -> Replica {
    let mut replica = Replica::new();
    replica
        .apply_payload(r#"{"type":"connected","user":{"userId":1,"username":"alice"}}"#)
        .unwrap();
    replica.add_users([user(1, "alice"), user(2, "bob")]);
    replica
}

#[test]
fn the_hello_identifies_the_user() {
    let mut replica = Replica::new();

    let events = replica
        .apply_payload(r#"{"type":"connected","user":{"userId":7,"username":"gus"}}"#)
        .unwrap();

    assert_eq!(replica.me(), Some(7));
    assert_eq!(
        events,
        [ReplicaEvent::Connected {
            user_id: 7,
            username: "gus".into()
        }]
    );
}

#[test]
fn replaying_a_new_user_patch_changes_nothing() {
    let mut replica = seeded();
    let patch = Patch::add(PatchPath::Users, to_value(user(3, "carol")).unwrap());

    let first = replica.apply(&patch).unwrap();
    let tree = replica.tree().clone();
    let second = replica.apply(&patch).unwrap();

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert_eq!(replica.tree(), &tree);
    assert_eq!(replica.user_id_by_name("carol"), Some(3));
}

#[test]
fn a_direct_message_pair_lands_once_per_participant() {
    let mut replica = seeded();
    let message = to_value(direct(9, 1, "hello")).unwrap();

    let payload = json!([
        { "op": "add", "path": "/users/1/messages/9", "value": message },
        { "op": "add", "path": "/users/2/messages/9", "value": message },
    ]);

    let events = replica.apply_payload(&payload.to_string()).unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(replica.tree().users[&1].messages[&9].message, "hello");
    assert_eq!(replica.tree().users[&2].messages[&9].sender, 1);

    let key = ConversationKey::new(2, 1).unwrap();
    assert_eq!(replica.conversation(key).unwrap().len(), 1);
}

#[test]
fn flat_message_paths_are_understood() {
    let mut replica = seeded();
    replica.add_rooms([room(10, "general", 1, 1)]);

    let dm = json!({ "op": "add", "path": "/messages", "value": direct(4, 2, "hey") });
    let room_message = RoomMessage {
        id: 5,
        room_id: 10,
        sender_id: 2,
        sender_name: "bob".into(),
        content: "hi room".into(),
        created_at: Utc::now(),
        client_message_id: None,
    };
    let in_room = json!({ "op": "add", "path": "/room_messages/10", "value": room_message });

    replica.apply_payload(&dm.to_string()).unwrap();
    replica.apply_payload(&in_room.to_string()).unwrap();

    assert_eq!(replica.tree().users[&2].messages.len(), 1);
    assert_eq!(replica.tree().rooms[&10].messages[&5].message, "hi room");
    assert_eq!(replica.room_timeline(10).unwrap().len(), 1);
}

#[test]
fn room_updates_carry_their_side_channel() {
    let mut replica = seeded();
    replica.add_rooms([room(10, "general", 1, 1)]);

    let payload = json!({
        "op": "replace",
        "path": "/rooms/10",
        "value": room(10, "general", 1, 2),
        "joinedUserId": 2,
    });

    let events = replica.apply_payload(&payload.to_string()).unwrap();

    assert!(matches!(
        &events[..],
        [ReplicaEvent::RoomUpdated { room, joined_user_id: Some(2), .. }] if room.member_count == 2
    ));
    assert_eq!(replica.room(10).unwrap().member_count, 2);
}

#[test]
fn ownership_changes_and_renames_update_the_indexes() {
    let mut replica = seeded();
    replica.add_rooms([room(10, "general", 1, 2)]);

    let payload = json!({
        "op": "replace",
        "path": "/rooms/10",
        "value": room(10, "lounge", 2, 2),
        "previousOwnerId": 1,
    });
    replica.apply_payload(&payload.to_string()).unwrap();

    assert_eq!(replica.tree().rooms[&10].owner_id, 2);
    assert_eq!(replica.room_id_by_name("lounge"), Some(10));
    assert_eq!(replica.room_id_by_name("general"), None);
}

#[test]
fn removals_clear_every_trace() {
    let mut replica = seeded();
    replica.add_rooms([room(10, "general", 2, 2)]);

    let payload = json!([
        { "op": "remove", "path": "/users/2" },
        { "op": "remove", "path": "/rooms/10" },
    ]);

    let events = replica.apply_payload(&payload.to_string()).unwrap();

    assert_eq!(
        events,
        [ReplicaEvent::UserRemoved(2), ReplicaEvent::RoomRemoved(10)]
    );
    assert!(replica.room(10).is_none());
    assert!(replica.user_id_by_name("bob").is_none());
    assert!(!replica.tree().rooms.contains_key(&10));

    // Removing again is harmless
    assert!(replica.apply_payload(&payload.to_string()).unwrap().is_empty());
}

#[test]
fn a_late_confirmation_of_a_staged_message_is_merged() {
    let mut replica = seeded();
    let staged = replica.stage_direct_message(2, "hi", "local-1").unwrap();

    // The server's copy, without the client id and 400ms later
    let confirmed = DirectMessage {
        id: 12,
        client_message_id: None,
        created_at: staged.created_at + Duration::milliseconds(400),
        ..direct(12, 1, "hi")
    };

    let events = replica.add_direct_messages([confirmed]);
    let timeline = replica.conversation(ConversationKey::new(1, 2).unwrap()).unwrap();

    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline.messages()[0].id, 12);
    assert!(matches!(events[..], [ReplicaEvent::MessageConfirmed { id: 12, .. }]));
}

#[test]
fn unknown_paths_are_ignored() {
    let mut replica = seeded();
    let payload = json!({ "op": "add", "path": "/sessions/4", "value": {} });

    assert!(replica.apply_payload(&payload.to_string()).unwrap().is_empty());
}

#[test]
fn malformed_values_are_errors() {
    let mut replica = seeded();
    let payload = json!({ "op": "add", "path": "/users", "value": { "id": "nope" } });

    assert!(replica.apply_payload(&payload.to_string()).is_err());
}
