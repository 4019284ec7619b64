use clack_core::wire;

use crate::{DirectMessage, RoomData, RoomMessage, UserData};

/// Turns stored data into the shape sent to clients.
pub trait ToSerialized {
    type Serialized: serde::Serialize;

    fn to_serialized(&self) -> Self::Serialized;
}

impl ToSerialized for UserData {
    type Serialized = wire::User;

    fn to_serialized(&self) -> Self::Serialized {
        wire::User {
            id: self.id,
            username: self.username.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized for RoomData {
    type Serialized = wire::Room;

    fn to_serialized(&self) -> Self::Serialized {
        wire::Room {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            owner_id: self.owner_id,
            owner_username: self.owner_username.clone(),
            created_at: self.created_at,
            member_count: self.member_count,
        }
    }
}

impl ToSerialized for DirectMessage {
    type Serialized = wire::DirectMessage;

    fn to_serialized(&self) -> Self::Serialized {
        wire::DirectMessage {
            id: self.id,
            user_a: self.conversation.user_a(),
            user_b: self.conversation.user_b(),
            sender_id: self.sender_id,
            sender_name: self.sender_name.clone(),
            content: self.content.clone(),
            created_at: self.created_at,
            client_message_id: self.client_message_id.clone(),
        }
    }
}

impl ToSerialized for RoomMessage {
    type Serialized = wire::RoomMessage;

    fn to_serialized(&self) -> Self::Serialized {
        wire::RoomMessage {
            id: self.id,
            room_id: self.room_id,
            sender_id: self.sender_id,
            sender_name: self.sender_name.clone(),
            content: self.content.clone(),
            created_at: self.created_at,
            client_message_id: self.client_message_id.clone(),
        }
    }
}

impl<T: ToSerialized> ToSerialized for Vec<T> {
    type Serialized = Vec<T::Serialized>;

    fn to_serialized(&self) -> Self::Serialized {
        self.iter().map(|item| item.to_serialized()).collect()
    }
}

/// Serializes into a JSON value. Serializing the wire types can't fail.
pub fn to_value<T: ToSerialized>(data: &T) -> serde_json::Value {
    serde_json::to_value(data.to_serialized()).unwrap_or_default()
}
