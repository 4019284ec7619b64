use std::collections::{BTreeMap, HashMap};

use clack_core::{
    decode_patches,
    wire::{DirectMessage, Room, RoomMessage, User},
    ConversationKey, EntityId, Patch, PatchOp, PatchPath,
};
use log::debug;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    client::ClientError,
    timeline::{Merge, Timeline},
    tree::DataTree,
};

#[derive(Debug, Error)]
pub enum ReplicaError {
    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Patch for {0} has no value")]
    MissingValue(String),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("No signed-in user is known yet")]
    NotSignedIn,
    #[error("A conversation needs two different users")]
    InvalidConversation,
}

/// A change applied to the replica, for whoever renders it.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicaEvent {
    Connected {
        user_id: EntityId,
        username: String,
    },
    UserAdded(User),
    UserRemoved(EntityId),
    RoomAdded(Room),
    RoomUpdated {
        room: Room,
        joined_user_id: Option<EntityId>,
        left_user_id: Option<EntityId>,
        previous_owner_id: Option<EntityId>,
    },
    RoomRemoved(EntityId),
    DirectMessageAdded(DirectMessage),
    RoomMessageAdded(RoomMessage),
    /// A staged message was acknowledged and now carries its server id
    MessageConfirmed {
        client_message_id: Option<String>,
        id: EntityId,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Hello {
    user: HelloUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HelloUser {
    user_id: EntityId,
    username: String,
}

/// A client's local copy of the chat state, kept current by snapshots and patches.
#[derive(Debug, Default)]
pub struct Replica {
    me: Option<EntityId>,
    tree: DataTree,
    users: BTreeMap<EntityId, User>,
    rooms: BTreeMap<EntityId, Room>,
    usernames: HashMap<String, EntityId>,
    room_names: HashMap<String, EntityId>,
    conversations: HashMap<ConversationKey, Timeline<DirectMessage>>,
    room_timelines: HashMap<EntityId, Timeline<RoomMessage>>,
    /// Source of ids for staged messages, counting down from zero
    last_local_id: EntityId,
}

impl Replica {
    pub fn new() -> Self {
        Self::default()
    }

    /// The signed-in user, once the feed has greeted us.
    pub fn me(&self) -> Option<EntityId> {
        self.me
    }

    pub fn tree(&self) -> &DataTree {
        &self.tree
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn user(&self, user_id: EntityId) -> Option<&User> {
        self.users.get(&user_id)
    }

    pub fn room(&self, room_id: EntityId) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    pub fn user_id_by_name(&self, username: &str) -> Option<EntityId> {
        self.usernames.get(username).copied()
    }

    pub fn room_id_by_name(&self, name: &str) -> Option<EntityId> {
        self.room_names.get(name).copied()
    }

    pub fn conversation(&self, key: ConversationKey) -> Option<&Timeline<DirectMessage>> {
        self.conversations.get(&key)
    }

    pub fn room_timeline(&self, room_id: EntityId) -> Option<&Timeline<RoomMessage>> {
        self.room_timelines.get(&room_id)
    }

    /// Applies one change-feed payload: the hello, a patch, or an array of patches.
    pub fn apply_payload(&mut self, payload: &str) -> Result<Vec<ReplicaEvent>, ReplicaError> {
        let value: Value = serde_json::from_str(payload)?;

        if value.get("type").and_then(Value::as_str) == Some("connected") {
            let hello: Hello = serde_json::from_value(value)?;
            self.me = Some(hello.user.user_id);

            return Ok(vec![ReplicaEvent::Connected {
                user_id: hello.user.user_id,
                username: hello.user.username,
            }]);
        }

        let mut events = Vec::new();

        for patch in decode_patches(payload)? {
            events.extend(self.apply(&patch)?);
        }

        Ok(events)
    }

    /// Applies a single patch. Addresses this replica doesn't track are ignored.
    pub fn apply(&mut self, patch: &Patch) -> Result<Vec<ReplicaEvent>, ReplicaError> {
        let Some(path) = patch.parsed_path() else {
            debug!("Ignoring patch for unknown path {}", patch.path);
            return Ok(vec![]);
        };

        let events = match (patch.op, path) {
            (PatchOp::Add, PatchPath::Users | PatchPath::User(_)) => {
                let user: User = value_of(patch)?;
                self.add_users([user])
            }
            (PatchOp::Remove, PatchPath::User(user_id)) => self.remove_user(user_id),
            (PatchOp::Add, PatchPath::Rooms | PatchPath::Room(_)) => {
                let room: Room = value_of(patch)?;
                self.add_rooms([room])
            }
            (PatchOp::Replace, PatchPath::Room(_)) => {
                let room: Room = value_of(patch)?;
                self.put_room(&room);

                vec![ReplicaEvent::RoomUpdated {
                    room,
                    joined_user_id: patch.meta_id("joinedUserId"),
                    left_user_id: patch.meta_id("leftUserId"),
                    previous_owner_id: patch.meta_id("previousOwnerId"),
                }]
            }
            (PatchOp::Remove, PatchPath::Room(room_id)) => self.remove_room(room_id),
            (PatchOp::Add, PatchPath::UserMessage { .. } | PatchPath::Messages) => {
                let message: DirectMessage = value_of(patch)?;
                self.add_direct_messages([message])
            }
            (PatchOp::Add, PatchPath::RoomMessage { .. } | PatchPath::RoomMessages(_)) => {
                let message: RoomMessage = value_of(patch)?;
                self.add_room_messages([message])
            }
            (op, path) => {
                debug!("Ignoring {op:?} on {path}");
                vec![]
            }
        };

        Ok(events)
    }

    pub fn add_users(&mut self, users: impl IntoIterator<Item = User>) -> Vec<ReplicaEvent> {
        let mut events = Vec::new();

        for user in users {
            self.tree.put_user(&user);
            self.usernames.insert(user.username.clone(), user.id);

            if self.users.get(&user.id) != Some(&user) {
                self.users.insert(user.id, user.clone());
                events.push(ReplicaEvent::UserAdded(user));
            }
        }

        events
    }

    pub fn add_rooms(&mut self, rooms: impl IntoIterator<Item = Room>) -> Vec<ReplicaEvent> {
        let mut events = Vec::new();

        for room in rooms {
            let known = self.rooms.contains_key(&room.id);
            self.put_room(&room);

            if !known {
                events.push(ReplicaEvent::RoomAdded(room));
            }
        }

        events
    }

    fn put_room(&mut self, room: &Room) {
        if let Some(previous) = self.rooms.get(&room.id) {
            if previous.name != room.name {
                self.room_names.remove(&previous.name);
            }
        }

        self.tree.put_room(room);
        self.room_names.insert(room.name.clone(), room.id);
        self.rooms.insert(room.id, room.clone());
    }

    fn remove_user(&mut self, user_id: EntityId) -> Vec<ReplicaEvent> {
        self.tree.remove_user(user_id);

        let Some(user) = self.users.remove(&user_id) else {
            return vec![];
        };

        self.usernames.remove(&user.username);
        self.conversations.retain(|key, _| !key.contains(user_id));

        vec![ReplicaEvent::UserRemoved(user_id)]
    }

    fn remove_room(&mut self, room_id: EntityId) -> Vec<ReplicaEvent> {
        self.tree.remove_room(room_id);
        self.room_timelines.remove(&room_id);

        let Some(room) = self.rooms.remove(&room_id) else {
            return vec![];
        };

        self.room_names.remove(&room.name);
        vec![ReplicaEvent::RoomRemoved(room_id)]
    }

    pub fn add_direct_messages(
        &mut self,
        messages: impl IntoIterator<Item = DirectMessage>,
    ) -> Vec<ReplicaEvent> {
        let mut events = Vec::new();

        for message in messages {
            let Some(key) = message.conversation() else {
                debug!("Dropping direct message {} without two participants", message.id);
                continue;
            };

            for user_id in key.participants() {
                self.tree.put_user_message(user_id, &message);
            }

            let timeline = self.conversations.entry(key).or_default();
            let merge = timeline.push(message.clone());
            events.extend(merged(merge, message, ReplicaEvent::DirectMessageAdded));
        }

        events
    }

    pub fn add_room_messages(
        &mut self,
        messages: impl IntoIterator<Item = RoomMessage>,
    ) -> Vec<ReplicaEvent> {
        let mut events = Vec::new();

        for message in messages {
            self.tree.put_room_message(&message);

            let timeline = self.room_timelines.entry(message.room_id).or_default();
            let merge = timeline.push(message.clone());
            events.extend(merged(merge, message, ReplicaEvent::RoomMessageAdded));
        }

        events
    }

    /// Puts an older page of a conversation in front of what's loaded.
    pub fn prepend_conversation_page(
        &mut self,
        key: ConversationKey,
        page: Vec<DirectMessage>,
        page_size: usize,
    ) -> usize {
        for message in &page {
            for user_id in key.participants() {
                self.tree.put_user_message(user_id, message);
            }
        }

        self.conversations
            .entry(key)
            .or_default()
            .prepend_page(page, page_size)
    }

    pub fn prepend_room_page(
        &mut self,
        room_id: EntityId,
        page: Vec<RoomMessage>,
        page_size: usize,
    ) -> usize {
        for message in &page {
            self.tree.put_room_message(message);
        }

        self.room_timelines
            .entry(room_id)
            .or_default()
            .prepend_page(page, page_size)
    }

    /// Removes users missing from a fresh listing, after a gap in the feed.
    pub fn retain_users(&mut self, keep: &[EntityId]) -> Vec<ReplicaEvent> {
        let gone: Vec<_> = self
            .users
            .keys()
            .filter(|id| !keep.contains(id))
            .copied()
            .collect();

        gone.into_iter().flat_map(|id| self.remove_user(id)).collect()
    }

    /// Removes rooms missing from a fresh listing, after a gap in the feed.
    pub fn retain_rooms(&mut self, keep: &[EntityId]) -> Vec<ReplicaEvent> {
        let gone: Vec<_> = self
            .rooms
            .keys()
            .filter(|id| !keep.contains(id))
            .copied()
            .collect();

        gone.into_iter().flat_map(|id| self.remove_room(id)).collect()
    }

    /// Takes back a staged message after the server refused it.
    pub fn discard_staged(&mut self, client_message_id: &str) -> bool {
        let in_conversations = self
            .conversations
            .values_mut()
            .any(|t| t.discard_staged(client_message_id));

        in_conversations
            || self
                .room_timelines
                .values_mut()
                .any(|t| t.discard_staged(client_message_id))
    }

    fn next_local_id(&mut self) -> EntityId {
        self.last_local_id -= 1;
        self.last_local_id
    }

    /// Shows a direct message before the server has accepted it.
    pub fn stage_direct_message(
        &mut self,
        recipient: EntityId,
        content: &str,
        client_message_id: &str,
    ) -> Option<DirectMessage> {
        let sender = self.me?;
        let key = ConversationKey::new(sender, recipient)?;

        let message = DirectMessage {
            id: self.next_local_id(),
            user_a: key.user_a(),
            user_b: key.user_b(),
            sender_id: sender,
            sender_name: self.sender_name(sender),
            content: content.to_string(),
            created_at: chrono::Utc::now(),
            client_message_id: Some(client_message_id.to_string()),
        };

        self.conversations
            .entry(key)
            .or_default()
            .push(message.clone());

        Some(message)
    }

    /// Shows a room message before the server has accepted it.
    pub fn stage_room_message(
        &mut self,
        room_id: EntityId,
        content: &str,
        client_message_id: &str,
    ) -> Option<RoomMessage> {
        let sender = self.me?;

        let message = RoomMessage {
            id: self.next_local_id(),
            room_id,
            sender_id: sender,
            sender_name: self.sender_name(sender),
            content: content.to_string(),
            created_at: chrono::Utc::now(),
            client_message_id: Some(client_message_id.to_string()),
        };

        self.room_timelines
            .entry(room_id)
            .or_default()
            .push(message.clone());

        Some(message)
    }

    fn sender_name(&self, user_id: EntityId) -> String {
        self.users
            .get(&user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    /// Records the signed-in user for replicas that aren't fed by a live connection.
    pub fn set_me(&mut self, user_id: EntityId) {
        self.me = Some(user_id);
    }
}

fn merged<M>(merge: Merge, message: M, added: fn(M) -> ReplicaEvent) -> Option<ReplicaEvent>
where
    M: crate::timeline::TimelineEntry,
{
    match merge {
        Merge::Inserted => Some(added(message)),
        Merge::Confirmed => Some(ReplicaEvent::MessageConfirmed {
            client_message_id: message.client_message_id().map(str::to_string),
            id: message.id(),
        }),
        Merge::Duplicate => None,
    }
}

fn value_of<T: DeserializeOwned>(patch: &Patch) -> Result<T, ReplicaError> {
    if patch.value.is_null() {
        return Err(ReplicaError::MissingValue(patch.path.clone()));
    }

    Ok(T::deserialize(&patch.value)?)
}
