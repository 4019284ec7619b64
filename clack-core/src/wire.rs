//! Entity shapes as they appear in tool results and patch values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConversationKey, EntityId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: EntityId,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_id: EntityId,
    #[serde(default)]
    pub owner_username: String,
    pub created_at: DateTime<Utc>,
    pub member_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub id: EntityId,
    pub user_a: EntityId,
    pub user_b: EntityId,
    pub sender_id: EntityId,
    #[serde(default)]
    pub sender_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
}

impl DirectMessage {
    /// The conversation this message belongs to, or None if the participants are malformed.
    pub fn conversation(&self) -> Option<ConversationKey> {
        ConversationKey::new(self.user_a, self.user_b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMessage {
    pub id: EntityId,
    pub room_id: EntityId,
    pub sender_id: EntityId,
    #[serde(default)]
    pub sender_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
}

/// A message is addressed either to a pair of users or to a room, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Direct(DirectMessage),
    Room(RoomMessage),
}

impl Message {
    pub fn id(&self) -> EntityId {
        match self {
            Message::Direct(m) => m.id,
            Message::Room(m) => m.id,
        }
    }
}
