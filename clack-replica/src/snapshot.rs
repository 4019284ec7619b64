//! Bulk loading of the initial state through the index range tools.

use clack_core::{
    wire::{DirectMessage, Room, RoomMessage, User},
    EntityId,
};
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::client::{call_json, ClientError, ToolClient};

/// How many entities are requested per snapshot call.
pub const BATCH_SIZE: usize = 100;

/// Fetches consecutive `[start, start + batch)` windows until a short page comes back.
pub async fn fetch_all<T, C>(
    client: &C,
    tool: &str,
    base_arguments: Value,
    batch_size: usize,
) -> Result<Vec<T>, ClientError>
where
    T: DeserializeOwned,
    C: ToolClient + ?Sized,
{
    let mut all = Vec::new();
    let mut start = 0;

    loop {
        let mut arguments = base_arguments.clone();

        if let Some(map) = arguments.as_object_mut() {
            map.insert("startIndex".into(), json!(start));
            map.insert("endIndex".into(), json!(start + batch_size));
        }

        let page: Vec<T> = call_json(client, tool, arguments).await?;
        let count = page.len();

        debug!("{tool} returned {count} entries from {start}");
        all.extend(page);

        if count < batch_size {
            break;
        }

        start += batch_size;
    }

    Ok(all)
}

pub async fn all_users<C: ToolClient + ?Sized>(client: &C) -> Result<Vec<User>, ClientError> {
    fetch_all(client, "get_users_by_index_range", json!({}), BATCH_SIZE).await
}

pub async fn all_rooms<C: ToolClient + ?Sized>(client: &C) -> Result<Vec<Room>, ClientError> {
    fetch_all(client, "get_rooms_by_index_range", json!({}), BATCH_SIZE).await
}

/// Every direct message the user takes part in.
pub async fn all_direct_messages<C: ToolClient + ?Sized>(
    client: &C,
    user_id: EntityId,
) -> Result<Vec<DirectMessage>, ClientError> {
    fetch_all(
        client,
        "get_messages_by_index_range",
        json!({ "userId": user_id }),
        BATCH_SIZE,
    )
    .await
}

pub async fn all_room_messages<C: ToolClient + ?Sized>(
    client: &C,
    room_id: EntityId,
) -> Result<Vec<RoomMessage>, ClientError> {
    fetch_all(
        client,
        "get_room_messages_by_index_range",
        json!({ "roomId": room_id }),
        BATCH_SIZE,
    )
    .await
}

pub async fn user_rooms<C: ToolClient + ?Sized>(
    client: &C,
    user_id: EntityId,
) -> Result<Vec<Room>, ClientError> {
    call_json(client, "get_user_rooms", json!({ "userId": user_id })).await
}

/// One page of a conversation, counted back from the newest message.
pub async fn conversation_page<C: ToolClient + ?Sized>(
    client: &C,
    user_a: EntityId,
    user_b: EntityId,
    start: usize,
    page_size: usize,
) -> Result<Vec<DirectMessage>, ClientError> {
    call_json(
        client,
        "get_messages_between_users_by_index_range",
        json!({
            "userA": user_a,
            "userB": user_b,
            "startIndex": start,
            "endIndex": start + page_size,
            "newestFirst": true,
        }),
    )
    .await
}

/// One page of a room, counted back from the newest message.
pub async fn room_page<C: ToolClient + ?Sized>(
    client: &C,
    room_id: EntityId,
    start: usize,
    page_size: usize,
) -> Result<Vec<RoomMessage>, ClientError> {
    call_json(
        client,
        "get_room_messages_by_index_range",
        json!({
            "roomId": room_id,
            "startIndex": start,
            "endIndex": start + page_size,
            "newestFirst": true,
        }),
    )
    .await
}
