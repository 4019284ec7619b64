//! The normalized tree the change feed addresses.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use clack_core::{
    wire::{DirectMessage, Room, RoomMessage, User},
    EntityId,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeMessage {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub sender: EntityId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TreeUser {
    pub name: String,
    pub messages: BTreeMap<EntityId, TreeMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRoom {
    pub name: String,
    pub owner_id: EntityId,
    pub messages: BTreeMap<EntityId, TreeMessage>,
}

/// `{users: {id -> user}, rooms: {id -> room}}`, with messages nested under their owners.
///
/// Every write is an assignment by key, so replaying the same change leaves the
/// tree as it was.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataTree {
    pub users: BTreeMap<EntityId, TreeUser>,
    pub rooms: BTreeMap<EntityId, TreeRoom>,
}

impl DataTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or renames a user, keeping any messages already filed under them.
    pub fn put_user(&mut self, user: &User) {
        self.users.entry(user.id).or_default().name = user.username.clone();
    }

    pub fn remove_user(&mut self, user_id: EntityId) -> bool {
        self.users.remove(&user_id).is_some()
    }

    pub fn put_room(&mut self, room: &Room) {
        let entry = self.rooms.entry(room.id).or_default();

        entry.name = room.name.clone();
        entry.owner_id = room.owner_id;
    }

    pub fn remove_room(&mut self, room_id: EntityId) -> bool {
        self.rooms.remove(&room_id).is_some()
    }

    /// Files a direct message under one participant. Unknown users are skipped.
    pub fn put_user_message(&mut self, user_id: EntityId, message: &DirectMessage) -> bool {
        let Some(user) = self.users.get_mut(&user_id) else {
            return false;
        };

        user.messages.insert(
            message.id,
            TreeMessage {
                timestamp: message.created_at,
                message: message.content.clone(),
                sender: message.sender_id,
            },
        );

        true
    }

    /// Files a room message under its room. Unknown rooms are skipped.
    pub fn put_room_message(&mut self, message: &RoomMessage) -> bool {
        let Some(room) = self.rooms.get_mut(&message.room_id) else {
            return false;
        };

        room.messages.insert(
            message.id,
            TreeMessage {
                timestamp: message.created_at,
                message: message.content.clone(),
                sender: message.sender_id,
            },
        );

        true
    }
}
