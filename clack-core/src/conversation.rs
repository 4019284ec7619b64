use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::EntityId;

/// Identifies a direct-message thread independently of who sent what.
///
/// The two participants are stored in ascending order, so `(a, b)` and `(b, a)`
/// produce the same key. A user can't have a conversation with themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationKey {
    user_a: EntityId,
    user_b: EntityId,
}

impl ConversationKey {
    /// Returns the canonical key for the pair, or None if both ids are the same.
    pub fn new(first: EntityId, second: EntityId) -> Option<Self> {
        match first.cmp(&second) {
            std::cmp::Ordering::Less => Some(Self {
                user_a: first,
                user_b: second,
            }),
            std::cmp::Ordering::Greater => Some(Self {
                user_a: second,
                user_b: first,
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// The lower of the two user ids
    pub fn user_a(&self) -> EntityId {
        self.user_a
    }

    /// The higher of the two user ids
    pub fn user_b(&self) -> EntityId {
        self.user_b
    }

    pub fn participants(&self) -> [EntityId; 2] {
        [self.user_a, self.user_b]
    }

    pub fn contains(&self, user_id: EntityId) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// Returns the participant that isn't `user_id`, if `user_id` takes part.
    pub fn other(&self, user_id: EntityId) -> Option<EntityId> {
        if user_id == self.user_a {
            Some(self.user_b)
        } else if user_id == self.user_b {
            Some(self.user_a)
        } else {
            None
        }
    }
}

impl Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.user_a, self.user_b)
    }
}
