use std::sync::Arc;

use clack_core::{
    random_string,
    wire::{DirectMessage, RoomMessage},
    ConversationKey, EntityId,
};
use log::{debug, info};
use parking_lot::Mutex;
use serde_json::json;

use crate::{
    client::{call_json, ToolClient},
    snapshot,
    timeline::PAGE_SIZE,
    Replica, ReplicaError, ReplicaEvent,
};

pub type SharedReplica = Arc<Mutex<Replica>>;

const CLIENT_MESSAGE_ID_LENGTH: usize = 16;

/// Drives a replica for one signed-in user: snapshots, sends, and scroll-back.
pub struct ReplicaSession<C: ?Sized> {
    client: Arc<C>,
    replica: SharedReplica,
}

impl<C: ?Sized> Clone for ReplicaSession<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            replica: self.replica.clone(),
        }
    }
}

impl<C> ReplicaSession<C>
where
    C: ToolClient + ?Sized,
{
    pub fn new(client: Arc<C>, user_id: EntityId) -> Self {
        let mut replica = Replica::new();
        replica.set_me(user_id);

        Self {
            client,
            replica: Arc::new(Mutex::new(replica)),
        }
    }

    pub fn replica(&self) -> &SharedReplica {
        &self.replica
    }

    fn me(&self) -> Result<EntityId, ReplicaError> {
        self.replica.lock().me().ok_or(ReplicaError::NotSignedIn)
    }

    /// Loads everything the user can see and reconciles it with what's held.
    pub async fn sync(&self) -> Result<Vec<ReplicaEvent>, ReplicaError> {
        let me = self.me()?;
        let client = &*self.client;

        let users = snapshot::all_users(client).await?;
        let rooms = snapshot::all_rooms(client).await?;
        let direct = snapshot::all_direct_messages(client, me).await?;
        let joined = snapshot::user_rooms(client, me).await?;

        let mut room_messages = Vec::new();

        for room in &joined {
            room_messages.extend(snapshot::all_room_messages(client, room.id).await?);
        }

        info!(
            "Synced {} users, {} rooms, {} direct and {} room messages",
            users.len(),
            rooms.len(),
            direct.len(),
            room_messages.len()
        );

        let user_ids: Vec<_> = users.iter().map(|u| u.id).collect();
        let room_ids: Vec<_> = rooms.iter().map(|r| r.id).collect();

        let mut replica = self.replica.lock();
        let mut events = replica.retain_users(&user_ids);

        events.extend(replica.retain_rooms(&room_ids));
        events.extend(replica.add_users(users));
        events.extend(replica.add_rooms(rooms));
        events.extend(replica.add_direct_messages(direct));
        events.extend(replica.add_room_messages(room_messages));

        Ok(events)
    }

    /// Shows the message right away, then swaps in the server's copy.
    pub async fn send_direct_message(
        &self,
        recipient: EntityId,
        content: &str,
    ) -> Result<DirectMessage, ReplicaError> {
        let client_message_id = random_string(CLIENT_MESSAGE_ID_LENGTH);

        self.replica
            .lock()
            .stage_direct_message(recipient, content, &client_message_id);

        let sent = call_json::<DirectMessage, _>(
            &*self.client,
            "send_message",
            json!({
                "otherUserId": recipient,
                "content": content,
                "clientMessageId": client_message_id,
            }),
        )
        .await;

        self.settle(sent, &client_message_id, |replica, message| {
            replica.add_direct_messages([message]);
        })
    }

    pub async fn send_room_message(
        &self,
        room_id: EntityId,
        content: &str,
    ) -> Result<RoomMessage, ReplicaError> {
        let client_message_id = random_string(CLIENT_MESSAGE_ID_LENGTH);

        self.replica
            .lock()
            .stage_room_message(room_id, content, &client_message_id);

        let sent = call_json::<RoomMessage, _>(
            &*self.client,
            "send_room_message",
            json!({
                "roomId": room_id,
                "content": content,
                "clientMessageId": client_message_id,
            }),
        )
        .await;

        self.settle(sent, &client_message_id, |replica, message| {
            replica.add_room_messages([message]);
        })
    }

    fn settle<M: Clone>(
        &self,
        sent: Result<M, crate::ClientError>,
        client_message_id: &str,
        confirm: impl FnOnce(&mut Replica, M),
    ) -> Result<M, ReplicaError> {
        let mut replica = self.replica.lock();

        match sent {
            Ok(message) => {
                confirm(&mut replica, message.clone());
                Ok(message)
            }
            Err(e) => {
                replica.discard_staged(client_message_id);
                Err(e.into())
            }
        }
    }

    /// Fetches the next older page of a conversation. Returns how many messages were new.
    pub async fn load_older_direct(&self, other_user: EntityId) -> Result<usize, ReplicaError> {
        let key = ConversationKey::new(self.me()?, other_user).ok_or(ReplicaError::InvalidConversation)?;

        let (offset, has_more) = {
            let replica = self.replica.lock();
            replica
                .conversation(key)
                .map(|t| (t.next_offset(), t.has_more()))
                .unwrap_or((0, true))
        };

        if !has_more {
            return Ok(0);
        }

        let page = snapshot::conversation_page(
            &*self.client,
            key.user_a(),
            key.user_b(),
            offset,
            PAGE_SIZE,
        )
        .await?;

        debug!("Loaded {} older messages with {other_user}", page.len());

        Ok(self
            .replica
            .lock()
            .prepend_conversation_page(key, page, PAGE_SIZE))
    }

    pub async fn load_older_room(&self, room_id: EntityId) -> Result<usize, ReplicaError> {
        let (offset, has_more) = {
            let replica = self.replica.lock();
            replica
                .room_timeline(room_id)
                .map(|t| (t.next_offset(), t.has_more()))
                .unwrap_or((0, true))
        };

        if !has_more {
            return Ok(0);
        }

        let page = snapshot::room_page(&*self.client, room_id, offset, PAGE_SIZE).await?;

        Ok(self.replica.lock().prepend_room_page(room_id, page, PAGE_SIZE))
    }
}
