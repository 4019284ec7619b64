use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clack_core::ConversationKey;
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod sqlite;
pub use sqlite::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource} with {identifier} {value} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
        value: String,
    },
}

impl DatabaseError {
    pub fn not_found(resource: &'static str, identifier: &'static str, value: impl ToString) -> Self {
        Self::NotFound {
            resource,
            identifier,
            value: value.to_string(),
        }
    }

    pub fn conflict(resource: &'static str, field: &'static str, value: impl ToString) -> Self {
        Self::Conflict {
            resource,
            field,
            value: value.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(
        self,
        resource: &'static str,
        identifier: &'static str,
        value: impl ToString,
    ) -> DatabaseError;
    fn any(self) -> DatabaseError;
    /// A unique constraint violation becomes a conflict, anything else stays internal
    fn conflict_or(
        self,
        resource: &'static str,
        field: &'static str,
        value: impl ToString,
    ) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::conflict(resource, field, value)),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Represents a type that can store and fetch chat data.
///
/// Listings are ordered by creation time, then id. Every room returned carries a
/// member count computed from the membership set at read time.
#[async_trait]
pub trait ChatStore: Send + Sync + 'static {
    async fn check_for_superuser(&self) -> Result<bool>;
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_username(&self, username: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;
    async fn list_users(&self, range: IndexRange) -> Result<Vec<UserData>>;
    async fn users_created_between(&self, range: TimeRange) -> Result<Vec<UserData>>;
    /// Deletes a user along with their sessions, memberships, rooms they own, and messages.
    /// Returns the ids of the rooms that were deleted with them.
    async fn delete_user(&self, user_id: PrimaryKey) -> Result<Vec<PrimaryKey>>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData>;
    async fn room_by_name(&self, name: &str) -> Result<RoomData>;
    /// Creates a room, making its owner the first member.
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    async fn list_rooms(&self, range: IndexRange) -> Result<Vec<RoomData>>;
    async fn rooms_created_between(&self, range: TimeRange) -> Result<Vec<RoomData>>;
    async fn user_rooms(&self, user_id: PrimaryKey) -> Result<Vec<RoomData>>;
    async fn room_member_ids(&self, room_id: PrimaryKey) -> Result<Vec<PrimaryKey>>;
    async fn is_room_member(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<bool>;
    /// Fails with a conflict if the user is already a member.
    async fn join_room(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<RoomData>;
    /// Fails with not found if the user isn't a member.
    async fn leave_room(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<RoomData>;
    async fn change_room_owner(
        &self,
        room_id: PrimaryKey,
        new_owner_id: PrimaryKey,
    ) -> Result<RoomData>;
    /// Deletes a room with its messages and memberships.
    async fn delete_room(&self, room_id: PrimaryKey) -> Result<()>;

    async fn create_direct_message(&self, new_message: NewDirectMessage) -> Result<DirectMessage>;
    async fn create_room_message(&self, new_message: NewRoomMessage) -> Result<RoomMessage>;
    /// Every direct message the user sent or received.
    async fn user_direct_messages(
        &self,
        user_id: PrimaryKey,
        range: IndexRange,
    ) -> Result<Vec<DirectMessage>>;
    async fn user_direct_messages_between(
        &self,
        user_id: PrimaryKey,
        range: TimeRange,
    ) -> Result<Vec<DirectMessage>>;
    async fn conversation_messages(
        &self,
        conversation: ConversationKey,
        range: IndexRange,
    ) -> Result<Vec<DirectMessage>>;
    async fn room_messages(&self, room_id: PrimaryKey, range: IndexRange)
        -> Result<Vec<RoomMessage>>;
    async fn room_messages_between(
        &self,
        room_id: PrimaryKey,
        range: TimeRange,
    ) -> Result<Vec<RoomMessage>>;
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub superuser: bool,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewRoom {
    pub name: String,
    pub description: String,
    /// The owner of the new room
    pub owner_id: PrimaryKey,
}

#[derive(Debug)]
pub struct NewDirectMessage {
    pub conversation: ConversationKey,
    pub sender_id: PrimaryKey,
    pub content: String,
    pub client_message_id: Option<String>,
}

impl NewDirectMessage {
    /// Returns None when the sender and recipient are the same user.
    pub fn new(
        sender_id: PrimaryKey,
        recipient_id: PrimaryKey,
        content: String,
        client_message_id: Option<String>,
    ) -> Option<Self> {
        Some(Self {
            conversation: ConversationKey::new(sender_id, recipient_id)?,
            sender_id,
            content,
            client_message_id,
        })
    }
}

#[derive(Debug)]
pub struct NewRoomMessage {
    pub room_id: PrimaryKey,
    pub sender_id: PrimaryKey,
    pub content: String,
    pub client_message_id: Option<String>,
}
