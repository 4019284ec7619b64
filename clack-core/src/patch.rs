//! The change-feed wire format.
//!
//! A [Patch] describes one change to the client's normalized tree, addressed by
//! a slash-delimited path such as `/rooms/10/messages/55`. Payloads pushed to
//! clients are either a single patch or an array of patches.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

/// A single addressable change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
    /// Side-channel fields such as `joinedUserId`
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl Patch {
    pub fn new(op: PatchOp, path: PatchPath, value: Value) -> Self {
        Self {
            op,
            path: path.to_string(),
            value,
            meta: Map::new(),
        }
    }

    pub fn add(path: PatchPath, value: Value) -> Self {
        Self::new(PatchOp::Add, path, value)
    }

    pub fn replace(path: PatchPath, value: Value) -> Self {
        Self::new(PatchOp::Replace, path, value)
    }

    pub fn remove(path: PatchPath) -> Self {
        Self::new(PatchOp::Remove, path, Value::Null)
    }

    /// Attaches a side-channel field.
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn meta_id(&self, key: &str) -> Option<EntityId> {
        self.meta.get(key).and_then(Value::as_i64)
    }

    /// Parses the path, returning None for unknown addresses.
    pub fn parsed_path(&self) -> Option<PatchPath> {
        PatchPath::parse(&self.path)
    }
}

/// Decodes a feed payload, which is either one patch or an array of patches.
pub fn decode_patches(payload: &str) -> serde_json::Result<Vec<Patch>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Payload {
        Many(Vec<Patch>),
        One(Patch),
    }

    Ok(match serde_json::from_str(payload)? {
        Payload::Many(patches) => patches,
        Payload::One(patch) => vec![patch],
    })
}

/// The addresses a patch can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchPath {
    /// `/users`, a new user with the id inside the value
    Users,
    /// `/users/{id}`
    User(EntityId),
    /// `/users/{id}/messages/{messageId}`
    UserMessage {
        user_id: EntityId,
        message_id: EntityId,
    },
    /// `/rooms`, a new room with the id inside the value
    Rooms,
    /// `/rooms/{id}`
    Room(EntityId),
    /// `/rooms/{id}/messages/{messageId}`
    RoomMessage {
        room_id: EntityId,
        message_id: EntityId,
    },
    /// `/messages`, the flat direct message form
    Messages,
    /// `/room_messages/{roomId}`, the flat room message form
    RoomMessages(EntityId),
}

impl PatchPath {
    pub fn parse(path: &str) -> Option<Self> {
        let parts: Vec<_> = path.split('/').filter(|p| !p.is_empty()).collect();
        let id = |index: usize| parts.get(index).and_then(|p| p.parse::<EntityId>().ok());

        let parsed = match parts.as_slice() {
            ["users"] => Self::Users,
            ["users", _] => Self::User(id(1)?),
            ["users", _, "messages", _] => Self::UserMessage {
                user_id: id(1)?,
                message_id: id(3)?,
            },
            ["rooms"] => Self::Rooms,
            ["rooms", _] => Self::Room(id(1)?),
            ["rooms", _, "messages", _] => Self::RoomMessage {
                room_id: id(1)?,
                message_id: id(3)?,
            },
            ["messages"] => Self::Messages,
            ["room_messages", _] => Self::RoomMessages(id(1)?),
            _ => return None,
        };

        Some(parsed)
    }
}

impl Display for PatchPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchPath::Users => write!(f, "/users"),
            PatchPath::User(id) => write!(f, "/users/{id}"),
            PatchPath::UserMessage {
                user_id,
                message_id,
            } => write!(f, "/users/{user_id}/messages/{message_id}"),
            PatchPath::Rooms => write!(f, "/rooms"),
            PatchPath::Room(id) => write!(f, "/rooms/{id}"),
            PatchPath::RoomMessage {
                room_id,
                message_id,
            } => write!(f, "/rooms/{room_id}/messages/{message_id}"),
            PatchPath::Messages => write!(f, "/messages"),
            PatchPath::RoomMessages(room_id) => write!(f, "/room_messages/{room_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_paths_parse_back() {
        let paths = [
            PatchPath::Users,
            PatchPath::User(3),
            PatchPath::UserMessage {
                user_id: 1,
                message_id: 40,
            },
            PatchPath::Rooms,
            PatchPath::Room(10),
            PatchPath::RoomMessage {
                room_id: 10,
                message_id: 41,
            },
            PatchPath::Messages,
            PatchPath::RoomMessages(10),
        ];

        for path in paths {
            assert_eq!(PatchPath::parse(&path.to_string()), Some(path));
        }
    }

    #[test]
    fn test_unknown_paths() {
        assert_eq!(PatchPath::parse("/users/abc"), None);
        assert_eq!(PatchPath::parse("/sessions/1"), None);
        assert_eq!(PatchPath::parse("/rooms/1/members/2"), None);
        assert_eq!(PatchPath::parse(""), None);
    }

    #[test]
    fn test_meta_is_flattened_on_the_wire() {
        let patch = Patch::replace(PatchPath::Room(10), json!({ "id": 10 })).with_meta("joinedUserId", 2);

        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "op": "replace", "path": "/rooms/10", "value": { "id": 10 }, "joinedUserId": 2 })
        );
        assert_eq!(patch.meta_id("joinedUserId"), Some(2));
    }

    #[test]
    fn test_remove_has_no_value() {
        let patch = Patch::remove(PatchPath::Room(4));

        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "op": "remove", "path": "/rooms/4" })
        );
    }

    #[test]
    fn test_decodes_single_and_batched_payloads() {
        let single = r#"{"op":"add","path":"/users/2","value":{"id":2}}"#;
        let batch = r#"[{"op":"add","path":"/users/1/messages/9","value":{}},{"op":"add","path":"/users/2/messages/9","value":{}}]"#;

        assert_eq!(decode_patches(single).unwrap().len(), 1);

        let patches = decode_patches(batch).unwrap();
        assert_eq!(patches.len(), 2);
        assert_eq!(
            patches[1].parsed_path(),
            Some(PatchPath::UserMessage {
                user_id: 2,
                message_id: 9
            })
        );
    }
}
