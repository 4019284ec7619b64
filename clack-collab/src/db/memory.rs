use async_trait::async_trait;
use chrono::Utc;
use clack_core::ConversationKey;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    ChatStore, DatabaseError, DirectMessage, IndexRange, NewDirectMessage,
    NewRoom, NewRoomMessage, NewSession, NewUser, PrimaryKey, Result, RoomData, RoomMessage,
    SessionData, TimeRange, UserData,
};

/// An in-process store, used when no database url is configured and in tests.
#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    last_id: PrimaryKey,
    users: BTreeMap<PrimaryKey, UserData>,
    sessions: BTreeMap<PrimaryKey, StoredSession>,
    rooms: BTreeMap<PrimaryKey, StoredRoom>,
    /// (room_id, user_id)
    members: BTreeSet<(PrimaryKey, PrimaryKey)>,
    direct_messages: BTreeMap<PrimaryKey, DirectMessage>,
    room_messages: BTreeMap<PrimaryKey, RoomMessage>,
}

struct StoredSession {
    token: String,
    user_id: PrimaryKey,
    expires_at: chrono::DateTime<Utc>,
}

struct StoredRoom {
    name: String,
    description: String,
    owner_id: PrimaryKey,
    created_at: chrono::DateTime<Utc>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryState {
    fn next_id(&mut self) -> PrimaryKey {
        self.last_id += 1;
        self.last_id
    }

    fn user(&self, user_id: PrimaryKey) -> Result<&UserData> {
        self.users
            .get(&user_id)
            .ok_or_else(|| DatabaseError::not_found("user", "id", user_id))
    }

    fn username(&self, user_id: PrimaryKey) -> String {
        self.users
            .get(&user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn room(&self, room_id: PrimaryKey) -> Result<RoomData> {
        let stored = self
            .rooms
            .get(&room_id)
            .ok_or_else(|| DatabaseError::not_found("room", "id", room_id))?;

        Ok(RoomData {
            id: room_id,
            name: stored.name.clone(),
            description: stored.description.clone(),
            owner_id: stored.owner_id,
            owner_username: self.username(stored.owner_id),
            created_at: stored.created_at,
            member_count: self.member_ids(room_id).len() as u32,
        })
    }

    fn rooms_where(&self, predicate: impl Fn(PrimaryKey, &StoredRoom) -> bool) -> Vec<RoomData> {
        let mut rooms: Vec<_> = self
            .rooms
            .iter()
            .filter(|(id, room)| predicate(**id, room))
            .filter_map(|(id, _)| self.room(*id).ok())
            .collect();

        rooms.sort_by_key(|r| (r.created_at, r.id));
        rooms
    }

    fn member_ids(&self, room_id: PrimaryKey) -> Vec<PrimaryKey> {
        self.members
            .range((room_id, PrimaryKey::MIN)..=(room_id, PrimaryKey::MAX))
            .map(|(_, user_id)| *user_id)
            .collect()
    }

    fn remove_room(&mut self, room_id: PrimaryKey) {
        self.rooms.remove(&room_id);
        self.members.retain(|(r, _)| *r != room_id);
        self.room_messages.retain(|_, m| m.room_id != room_id);
    }

    fn direct_messages_where(&self, predicate: impl Fn(&DirectMessage) -> bool) -> Vec<DirectMessage> {
        let mut messages: Vec<_> = self
            .direct_messages
            .values()
            .filter(|m| predicate(m))
            .cloned()
            .collect();

        messages.sort_by_key(|m| (m.created_at, m.id));
        messages
    }

    fn room_messages_where(&self, predicate: impl Fn(&RoomMessage) -> bool) -> Vec<RoomMessage> {
        let mut messages: Vec<_> = self
            .room_messages
            .values()
            .filter(|m| predicate(m))
            .cloned()
            .collect();

        messages.sort_by_key(|m| (m.created_at, m.id));
        messages
    }
}

#[async_trait]
impl ChatStore for MemoryDatabase {
    async fn check_for_superuser(&self) -> Result<bool> {
        Ok(self.state.lock().users.values().any(|u| u.superuser))
    }

    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.state.lock().user(user_id).cloned()
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        self.state
            .lock()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("user", "username", username))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        let mut state = self.state.lock();

        if state.users.values().any(|u| u.username == new_user.username) {
            return Err(DatabaseError::conflict("user", "username", &new_user.username));
        }

        let user = UserData {
            id: state.next_id(),
            username: new_user.username,
            password: new_user.password,
            superuser: new_user.superuser,
            created_at: Utc::now(),
        };

        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_users(&self, range: IndexRange) -> Result<Vec<UserData>> {
        let state = self.state.lock();
        let mut users: Vec<_> = state.users.values().cloned().collect();

        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(range.slice(&users))
    }

    async fn users_created_between(&self, range: TimeRange) -> Result<Vec<UserData>> {
        let state = self.state.lock();
        let mut users: Vec<_> = state
            .users
            .values()
            .filter(|u| range.contains(u.created_at))
            .cloned()
            .collect();

        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(users)
    }

    async fn delete_user(&self, user_id: PrimaryKey) -> Result<Vec<PrimaryKey>> {
        let mut state = self.state.lock();
        state.user(user_id)?;

        let owned: Vec<_> = state
            .rooms
            .iter()
            .filter(|(_, room)| room.owner_id == user_id)
            .map(|(id, _)| *id)
            .collect();

        for room_id in &owned {
            state.remove_room(*room_id);
        }

        state.users.remove(&user_id);
        state.sessions.retain(|_, s| s.user_id != user_id);
        state.members.retain(|(_, u)| *u != user_id);
        state.direct_messages.retain(|_, m| !m.conversation.contains(user_id));
        state.room_messages.retain(|_, m| m.sender_id != user_id);

        Ok(owned)
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let state = self.state.lock();
        let (id, session) = state
            .sessions
            .iter()
            .find(|(_, s)| s.token == token)
            .ok_or_else(|| DatabaseError::not_found("session", "token", "<redacted>"))?;

        Ok(SessionData {
            id: *id,
            token: session.token.clone(),
            expires_at: session.expires_at,
            user: state.user(session.user_id)?.clone(),
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let mut state = self.state.lock();
        let user = state.user(new_session.user_id)?.clone();
        let id = state.next_id();

        state.sessions.insert(
            id,
            StoredSession {
                token: new_session.token.clone(),
                user_id: user.id,
                expires_at: new_session.expires_at,
            },
        );

        Ok(SessionData {
            id,
            token: new_session.token,
            expires_at: new_session.expires_at,
            user,
        })
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.sessions.len();

        state.sessions.retain(|_, s| s.token != token);

        if state.sessions.len() == before {
            return Err(DatabaseError::not_found("session", "token", "<redacted>"));
        }

        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();
        self.state.lock().sessions.retain(|_, s| s.expires_at > now);

        Ok(())
    }

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData> {
        self.state.lock().room(room_id)
    }

    async fn room_by_name(&self, name: &str) -> Result<RoomData> {
        let state = self.state.lock();
        let id = state
            .rooms
            .iter()
            .find(|(_, r)| r.name == name)
            .map(|(id, _)| *id)
            .ok_or_else(|| DatabaseError::not_found("room", "name", name))?;

        state.room(id)
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        let mut state = self.state.lock();
        state.user(new_room.owner_id)?;

        if state.rooms.values().any(|r| r.name == new_room.name) {
            return Err(DatabaseError::conflict("room", "name", &new_room.name));
        }

        let id = state.next_id();
        state.rooms.insert(
            id,
            StoredRoom {
                name: new_room.name,
                description: new_room.description,
                owner_id: new_room.owner_id,
                created_at: Utc::now(),
            },
        );
        state.members.insert((id, new_room.owner_id));

        state.room(id)
    }

    async fn list_rooms(&self, range: IndexRange) -> Result<Vec<RoomData>> {
        let rooms = self.state.lock().rooms_where(|_, _| true);
        Ok(range.slice(&rooms))
    }

    async fn rooms_created_between(&self, range: TimeRange) -> Result<Vec<RoomData>> {
        Ok(self
            .state
            .lock()
            .rooms_where(|_, room| range.contains(room.created_at)))
    }

    async fn user_rooms(&self, user_id: PrimaryKey) -> Result<Vec<RoomData>> {
        let state = self.state.lock();
        state.user(user_id)?;

        Ok(state.rooms_where(|id, _| state.members.contains(&(id, user_id))))
    }

    async fn room_member_ids(&self, room_id: PrimaryKey) -> Result<Vec<PrimaryKey>> {
        let state = self.state.lock();
        state.room(room_id)?;

        Ok(state.member_ids(room_id))
    }

    async fn is_room_member(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<bool> {
        Ok(self.state.lock().members.contains(&(room_id, user_id)))
    }

    async fn join_room(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<RoomData> {
        let mut state = self.state.lock();
        state.room(room_id)?;
        state.user(user_id)?;

        if !state.members.insert((room_id, user_id)) {
            return Err(DatabaseError::conflict("room member", "user id", user_id));
        }

        state.room(room_id)
    }

    async fn leave_room(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<RoomData> {
        let mut state = self.state.lock();
        state.room(room_id)?;

        if !state.members.remove(&(room_id, user_id)) {
            return Err(DatabaseError::not_found("room member", "user id", user_id));
        }

        state.room(room_id)
    }

    async fn change_room_owner(
        &self,
        room_id: PrimaryKey,
        new_owner_id: PrimaryKey,
    ) -> Result<RoomData> {
        let mut state = self.state.lock();
        state.user(new_owner_id)?;

        let room = state
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| DatabaseError::not_found("room", "id", room_id))?;

        room.owner_id = new_owner_id;
        state.room(room_id)
    }

    async fn delete_room(&self, room_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        state.room(room_id)?;
        state.remove_room(room_id);

        Ok(())
    }

    async fn create_direct_message(&self, new_message: NewDirectMessage) -> Result<DirectMessage> {
        let mut state = self.state.lock();

        for user_id in new_message.conversation.participants() {
            state.user(user_id)?;
        }

        let message = DirectMessage {
            id: state.next_id(),
            conversation: new_message.conversation,
            sender_id: new_message.sender_id,
            sender_name: state.username(new_message.sender_id),
            content: new_message.content,
            client_message_id: new_message.client_message_id,
            created_at: Utc::now(),
        };

        state.direct_messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn create_room_message(&self, new_message: NewRoomMessage) -> Result<RoomMessage> {
        let mut state = self.state.lock();
        state.room(new_message.room_id)?;
        state.user(new_message.sender_id)?;

        let message = RoomMessage {
            id: state.next_id(),
            room_id: new_message.room_id,
            sender_id: new_message.sender_id,
            sender_name: state.username(new_message.sender_id),
            content: new_message.content,
            client_message_id: new_message.client_message_id,
            created_at: Utc::now(),
        };

        state.room_messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn user_direct_messages(
        &self,
        user_id: PrimaryKey,
        range: IndexRange,
    ) -> Result<Vec<DirectMessage>> {
        let messages = self
            .state
            .lock()
            .direct_messages_where(|m| m.conversation.contains(user_id));

        Ok(range.slice(&messages))
    }

    async fn user_direct_messages_between(
        &self,
        user_id: PrimaryKey,
        range: TimeRange,
    ) -> Result<Vec<DirectMessage>> {
        Ok(self.state.lock().direct_messages_where(|m| {
            m.conversation.contains(user_id) && range.contains(m.created_at)
        }))
    }

    async fn conversation_messages(
        &self,
        conversation: ConversationKey,
        range: IndexRange,
    ) -> Result<Vec<DirectMessage>> {
        let messages = self
            .state
            .lock()
            .direct_messages_where(|m| m.conversation == conversation);

        Ok(range.slice(&messages))
    }

    async fn room_messages(
        &self,
        room_id: PrimaryKey,
        range: IndexRange,
    ) -> Result<Vec<RoomMessage>> {
        let messages = self
            .state
            .lock()
            .room_messages_where(|m| m.room_id == room_id);

        Ok(range.slice(&messages))
    }

    async fn room_messages_between(
        &self,
        room_id: PrimaryKey,
        range: TimeRange,
    ) -> Result<Vec<RoomMessage>> {
        Ok(self
            .state
            .lock()
            .room_messages_where(|m| m.room_id == room_id && range.contains(m.created_at)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn user(db: &MemoryDatabase, username: &str) -> UserData {
        db.create_user(NewUser {
            username: username.into(),
            password: "hash".into(),
            superuser: false,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_usernames_are_unique() {
        let db = MemoryDatabase::new();
        user(&db, "alice").await;

        let result = db
            .create_user(NewUser {
                username: "alice".into(),
                password: "other".into(),
                superuser: false,
            })
            .await;

        assert!(matches!(result, Err(DatabaseError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_member_count_follows_membership() {
        let db = MemoryDatabase::new();
        let alice = user(&db, "alice").await;
        let bob = user(&db, "bob").await;

        let room = db
            .create_room(NewRoom {
                name: "general".into(),
                description: String::new(),
                owner_id: alice.id,
            })
            .await
            .unwrap();
        assert_eq!(room.member_count, 1);
        assert_eq!(room.owner_username, "alice");

        let room = db.join_room(room.id, bob.id).await.unwrap();
        assert_eq!(room.member_count, 2);

        assert!(matches!(
            db.join_room(room.id, bob.id).await,
            Err(DatabaseError::Conflict { .. })
        ));

        let room = db.leave_room(room.id, bob.id).await.unwrap();
        assert_eq!(room.member_count, 1);

        assert!(db.leave_room(room.id, bob.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_deleting_a_room_cascades() {
        let db = MemoryDatabase::new();
        let alice = user(&db, "alice").await;

        let room = db
            .create_room(NewRoom {
                name: "general".into(),
                description: String::new(),
                owner_id: alice.id,
            })
            .await
            .unwrap();

        db.create_room_message(NewRoomMessage {
            room_id: room.id,
            sender_id: alice.id,
            content: "hello".into(),
            client_message_id: None,
        })
        .await
        .unwrap();

        db.delete_room(room.id).await.unwrap();

        assert!(db.room_by_id(room.id).await.unwrap_err().is_not_found());
        assert!(db
            .room_messages(room.id, IndexRange::new(0, 10))
            .await
            .unwrap()
            .is_empty());
        assert!(!db.is_room_member(room.id, alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_conversation_is_shared_by_both_directions() {
        let db = MemoryDatabase::new();
        let alice = user(&db, "alice").await;
        let bob = user(&db, "bob").await;

        for (from, to) in [(alice.id, bob.id), (bob.id, alice.id)] {
            let message = NewDirectMessage::new(from, to, "hi".into(), None).unwrap();
            db.create_direct_message(message).await.unwrap();
        }

        let key = ConversationKey::new(bob.id, alice.id).unwrap();
        let messages = db
            .conversation_messages(key, IndexRange::new(0, 10))
            .await
            .unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender_id, alice.id);
        assert_eq!(messages[0].sender_name, "alice");
        assert_eq!(messages[1].sender_id, bob.id);
    }

    #[tokio::test]
    async fn test_deleting_a_user_removes_owned_rooms() {
        let db = MemoryDatabase::new();
        let alice = user(&db, "alice").await;
        let bob = user(&db, "bob").await;

        let room = db
            .create_room(NewRoom {
                name: "alices".into(),
                description: String::new(),
                owner_id: alice.id,
            })
            .await
            .unwrap();
        db.join_room(room.id, bob.id).await.unwrap();

        let deleted = db.delete_user(alice.id).await.unwrap();

        assert_eq!(deleted, vec![room.id]);
        assert!(db.user_by_id(alice.id).await.unwrap_err().is_not_found());
        assert!(db.user_rooms(bob.id).await.unwrap().is_empty());
    }
}
