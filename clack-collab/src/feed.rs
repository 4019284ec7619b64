//! Turns committed mutations into change-feed patches and decides who receives them.

use clack_core::{Patch, PatchPath};
use serde_json::Value;

use crate::{serialized::to_value, ChatEvent, PrimaryKey};

/// Who a feed message is delivered to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every connected client
    Everyone,
    /// Only the connections of these users
    Users(Vec<PrimaryKey>),
}

impl Audience {
    pub fn includes(&self, user_id: PrimaryKey) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::Users(ids) => ids.contains(&user_id),
        }
    }
}

/// The patches produced by one event, with their audience
#[derive(Debug, Clone)]
pub struct FeedMessage {
    pub audience: Audience,
    pub patches: Vec<Patch>,
}

impl FeedMessage {
    fn everyone(patches: Vec<Patch>) -> Self {
        Self {
            audience: Audience::Everyone,
            patches,
        }
    }

    /// The wire form: a lone patch is sent as an object, several as an array.
    pub fn payload(&self) -> String {
        let value = match self.patches.as_slice() {
            [patch] => serde_json::to_value(patch),
            patches => serde_json::to_value(patches),
        };

        value.unwrap_or(Value::Null).to_string()
    }
}

/// Encodes a committed mutation as addressable patches.
pub fn encode(event: &ChatEvent) -> FeedMessage {
    match event {
        ChatEvent::UserRegistered { user } => {
            FeedMessage::everyone(vec![Patch::add(PatchPath::Users, to_value(user))])
        }
        ChatEvent::UserDeleted {
            user_id,
            deleted_room_ids,
        } => {
            let mut patches = vec![Patch::remove(PatchPath::User(*user_id))];
            patches.extend(
                deleted_room_ids
                    .iter()
                    .map(|room_id| Patch::remove(PatchPath::Room(*room_id))),
            );

            FeedMessage::everyone(patches)
        }
        ChatEvent::RoomCreated { room } => {
            FeedMessage::everyone(vec![Patch::add(PatchPath::Rooms, to_value(room))])
        }
        ChatEvent::UserJoined { room, user_id } => FeedMessage::everyone(vec![Patch::replace(
            PatchPath::Room(room.id),
            to_value(room),
        )
        .with_meta("joinedUserId", *user_id)]),
        ChatEvent::UserLeft { room, user_id } => FeedMessage::everyone(vec![Patch::replace(
            PatchPath::Room(room.id),
            to_value(room),
        )
        .with_meta("leftUserId", *user_id)]),
        ChatEvent::RoomOwnerChanged {
            room,
            previous_owner_id,
        } => FeedMessage::everyone(vec![Patch::replace(
            PatchPath::Room(room.id),
            to_value(room),
        )
        .with_meta("previousOwnerId", *previous_owner_id)]),
        ChatEvent::RoomDeleted { room_id } => {
            FeedMessage::everyone(vec![Patch::remove(PatchPath::Room(*room_id))])
        }
        ChatEvent::DirectMessageSent { message } => {
            let value = to_value(message);
            let participants = message.conversation.participants();

            let patches = participants
                .iter()
                .map(|user_id| {
                    Patch::add(
                        PatchPath::UserMessage {
                            user_id: *user_id,
                            message_id: message.id,
                        },
                        value.clone(),
                    )
                })
                .collect();

            FeedMessage {
                audience: Audience::Users(participants.to_vec()),
                patches,
            }
        }
        ChatEvent::RoomMessageSent {
            message,
            member_ids,
        } => FeedMessage {
            audience: Audience::Users(member_ids.clone()),
            patches: vec![Patch::add(
                PatchPath::RoomMessage {
                    room_id: message.room_id,
                    message_id: message.id,
                },
                to_value(message),
            )],
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use clack_core::{decode_patches, ConversationKey, PatchOp};

    use super::*;
    use crate::{DirectMessage, RoomData, RoomMessage};

    fn room(member_count: u32) -> RoomData {
        RoomData {
            id: 10,
            name: "general".into(),
            description: String::new(),
            owner_id: 1,
            owner_username: "alice".into(),
            created_at: Utc::now(),
            member_count,
        }
    }

    #[test]
    fn test_direct_message_goes_to_both_participants() {
        let message = DirectMessage {
            id: 5,
            conversation: ConversationKey::new(2, 1).unwrap(),
            sender_id: 1,
            sender_name: "alice".into(),
            content: "hello".into(),
            client_message_id: None,
            created_at: Utc::now(),
        };

        let feed = encode(&ChatEvent::DirectMessageSent { message });

        assert_eq!(feed.audience, Audience::Users(vec![1, 2]));
        assert!(!feed.audience.includes(3));

        let paths: Vec<_> = feed.patches.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, ["/users/1/messages/5", "/users/2/messages/5"]);
        assert_eq!(feed.patches[0].value["userA"], 1);
        assert_eq!(feed.patches[0].value["userB"], 2);
    }

    #[test]
    fn test_join_carries_joined_user() {
        let feed = encode(&ChatEvent::UserJoined {
            room: room(2),
            user_id: 2,
        });

        assert_eq!(feed.audience, Audience::Everyone);

        let patch = &feed.patches[0];
        assert_eq!(patch.op, PatchOp::Replace);
        assert_eq!(patch.path, "/rooms/10");
        assert_eq!(patch.meta_id("joinedUserId"), Some(2));
        assert_eq!(patch.value["memberCount"], 2);
    }

    #[test]
    fn test_room_message_targets_members() {
        let message = RoomMessage {
            id: 7,
            room_id: 10,
            sender_id: 1,
            sender_name: "alice".into(),
            content: "hi all".into(),
            client_message_id: Some("abc".into()),
            created_at: Utc::now(),
        };

        let feed = encode(&ChatEvent::RoomMessageSent {
            message,
            member_ids: vec![1, 2],
        });

        assert_eq!(feed.audience, Audience::Users(vec![1, 2]));
        assert_eq!(feed.patches[0].path, "/rooms/10/messages/7");
        assert_eq!(feed.patches[0].value["clientMessageId"], "abc");
    }

    #[test]
    fn test_payload_shape() {
        let single = encode(&ChatEvent::RoomDeleted { room_id: 10 });
        assert!(single.payload().starts_with('{'));

        let many = encode(&ChatEvent::UserDeleted {
            user_id: 1,
            deleted_room_ids: vec![10, 11],
        });
        assert!(many.payload().starts_with('['));

        let decoded = decode_patches(&many.payload()).unwrap();
        assert_eq!(decoded.len(), 3);
        assert!(decoded.iter().all(|p| p.op == PatchOp::Remove));
    }
}
