use crossbeam::channel::{Receiver, Sender};
use log::warn;

use crate::{DirectMessage, PrimaryKey, RoomData, RoomMessage, UserData};

pub type EventSender = Sender<ChatEvent>;
pub type EventReceiver = Receiver<ChatEvent>;

/// Events emitted by the collab system after a mutation has been committed
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A new account was created
    UserRegistered { user: UserData },
    /// An account was deleted, along with the rooms it owned
    UserDeleted {
        user_id: PrimaryKey,
        deleted_room_ids: Vec<PrimaryKey>,
    },
    /// A room was created, with its owner as the only member
    RoomCreated { room: RoomData },
    /// User became a member of a room
    UserJoined { room: RoomData, user_id: PrimaryKey },
    /// User left a room
    UserLeft { room: RoomData, user_id: PrimaryKey },
    /// The owner of a room was changed
    RoomOwnerChanged {
        room: RoomData,
        previous_owner_id: PrimaryKey,
    },
    /// A room was deleted with its messages and memberships
    RoomDeleted { room_id: PrimaryKey },
    /// A direct message was sent
    DirectMessageSent { message: DirectMessage },
    /// A message was posted to a room
    RoomMessageSent {
        message: RoomMessage,
        /// The members of the room at the time of posting
        member_ids: Vec<PrimaryKey>,
    },
}

/// Something that wants to hear about committed mutations.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ChatEvent);
}

impl EventSink for EventSender {
    fn emit(&self, event: ChatEvent) {
        if self.send(event).is_err() {
            warn!("Event receiver is gone, dropping event");
        }
    }
}

/// Discards every event
pub struct NoEvents;

impl EventSink for NoEvents {
    fn emit(&self, _: ChatEvent) {}
}
