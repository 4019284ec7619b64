use chrono::{DateTime, Utc};
use clack_core::{ConversationKey, EntityId};

/// The type used for primary keys in the database.
pub type PrimaryKey = EntityId;

/// A chat account
#[derive(Debug, Clone)]
pub struct UserData {
    pub id: PrimaryKey,
    pub username: String,
    /// The argon2 hash of the password
    pub password: String,
    pub superuser: bool,
    pub created_at: DateTime<Utc>,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

/// A chat room
#[derive(Debug, Clone)]
pub struct RoomData {
    pub id: PrimaryKey,
    /// Unique across all rooms
    pub name: String,
    pub description: String,
    pub owner_id: PrimaryKey,
    pub owner_username: String,
    pub created_at: DateTime<Utc>,
    /// Always computed from the membership set when the room is read.
    pub member_count: u32,
}

/// A message between exactly two users
#[derive(Debug, Clone)]
pub struct DirectMessage {
    pub id: PrimaryKey,
    pub conversation: ConversationKey,
    pub sender_id: PrimaryKey,
    pub sender_name: String,
    pub content: String,
    pub client_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A message posted to a room
#[derive(Debug, Clone)]
pub struct RoomMessage {
    pub id: PrimaryKey,
    pub room_id: PrimaryKey,
    pub sender_id: PrimaryKey,
    pub sender_name: String,
    pub content: String,
    pub client_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Any stored message. A message targets a conversation or a room, never both.
#[derive(Debug, Clone)]
pub enum MessageData {
    Direct(DirectMessage),
    Room(RoomMessage),
}

impl MessageData {
    pub fn id(&self) -> PrimaryKey {
        match self {
            Self::Direct(m) => m.id,
            Self::Room(m) => m.id,
        }
    }

    pub fn sender_id(&self) -> PrimaryKey {
        match self {
            Self::Direct(m) => m.sender_id,
            Self::Room(m) => m.sender_id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Direct(m) => m.created_at,
            Self::Room(m) => m.created_at,
        }
    }

    /// Builds a message from a storage row where the target columns are nullable.
    /// Returns None unless exactly one of conversation or room is present.
    #[allow(clippy::too_many_arguments)]
    pub fn from_columns(
        id: PrimaryKey,
        user_a: Option<PrimaryKey>,
        user_b: Option<PrimaryKey>,
        room_id: Option<PrimaryKey>,
        sender_id: PrimaryKey,
        sender_name: String,
        content: String,
        client_message_id: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Option<Self> {
        match (user_a, user_b, room_id) {
            (Some(a), Some(b), None) => {
                let conversation = ConversationKey::new(a, b)?;

                if !conversation.contains(sender_id) {
                    return None;
                }

                Some(Self::Direct(DirectMessage {
                    id,
                    conversation,
                    sender_id,
                    sender_name,
                    content,
                    client_message_id,
                    created_at,
                }))
            }
            (None, None, Some(room_id)) => Some(Self::Room(RoomMessage {
                id,
                room_id,
                sender_id,
                sender_name,
                content,
                client_message_id,
                created_at,
            })),
            _ => None,
        }
    }
}

/// An inclusive window of creation times
#[derive(Debug, Clone, Copy)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && time <= self.end
    }
}

/// A half-open window `[start, end)` over an ordered listing
#[derive(Debug, Clone, Copy)]
pub struct IndexRange {
    pub start: usize,
    pub end: usize,
    /// Count the window from the newest entry instead of the oldest
    pub newest_first: bool,
}

impl IndexRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            newest_first: false,
        }
    }

    /// A window counted back from the newest entry. The page itself is still in creation order.
    pub fn newest(start: usize, end: usize) -> Self {
        Self {
            newest_first: true,
            ..Self::new(start, end)
        }
    }

    /// How many items the range spans. Zero when `end <= start`.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies the window to an already ordered listing.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        if !self.newest_first {
            return items.iter().skip(self.start).take(self.len()).cloned().collect();
        }

        let mut page: Vec<T> = items
            .iter()
            .rev()
            .skip(self.start)
            .take(self.len())
            .cloned()
            .collect();

        page.reverse();
        page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(
        user_a: Option<PrimaryKey>,
        user_b: Option<PrimaryKey>,
        room_id: Option<PrimaryKey>,
        sender_id: PrimaryKey,
    ) -> Option<MessageData> {
        MessageData::from_columns(
            1,
            user_a,
            user_b,
            room_id,
            sender_id,
            "alice".into(),
            "hi".into(),
            None,
            Utc::now(),
        )
    }

    #[test]
    fn test_message_targets_exactly_one_destination() {
        assert!(matches!(columns(Some(1), Some(2), None, 1), Some(MessageData::Direct(_))));
        assert!(matches!(columns(None, None, Some(7), 1), Some(MessageData::Room(_))));

        assert!(columns(Some(1), Some(2), Some(7), 1).is_none());
        assert!(columns(None, None, None, 1).is_none());
        assert!(columns(Some(1), None, None, 1).is_none());
    }

    #[test]
    fn test_direct_message_sender_must_participate() {
        assert!(columns(Some(1), Some(2), None, 3).is_none());
        assert!(columns(Some(2), Some(2), None, 2).is_none());
    }

    #[test]
    fn test_index_range_slices_half_open() {
        let items = vec![1, 2, 3, 4, 5];

        assert_eq!(IndexRange::new(1, 3).slice(&items), vec![2, 3]);
        assert_eq!(IndexRange::new(3, 100).slice(&items), vec![4, 5]);
        assert!(IndexRange::new(4, 2).slice(&items).is_empty());
        assert!(IndexRange::new(10, 20).slice(&items).is_empty());

        assert_eq!(IndexRange::newest(0, 2).slice(&items), vec![4, 5]);
        assert_eq!(IndexRange::newest(2, 4).slice(&items), vec![2, 3]);
        assert_eq!(IndexRange::newest(4, 8).slice(&items), vec![1]);
    }
}
