use chrono::{DateTime, Utc};
use clack_core::{ConversationKey, ToolOutput};
use log::info;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use super::{catalog::*, guard, ToolDispatcher, ToolError};
use crate::{
    serialized::to_value, CallerIdentity, ChatEvent, ChatStore, IndexRange, NewDirectMessage,
    NewRoom, NewRoomMessage, PrimaryKey, TimeRange,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageArgs {
    other_user_id: PrimaryKey,
    content: String,
    client_message_id: Option<String>,
}

#[derive(Deserialize)]
struct CreateRoomArgs {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomArgs {
    room_id: PrimaryKey,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendRoomMessageArgs {
    room_id: PrimaryKey,
    content: String,
    client_message_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeRangeArgs {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    user_id: Option<PrimaryKey>,
    room_id: Option<PrimaryKey>,
}

impl TimeRangeArgs {
    fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexRangeArgs {
    start_index: usize,
    end_index: usize,
    user_id: Option<PrimaryKey>,
    room_id: Option<PrimaryKey>,
    user_a: Option<PrimaryKey>,
    user_b: Option<PrimaryKey>,
    #[serde(default)]
    newest_first: bool,
}

impl IndexRangeArgs {
    fn range(&self) -> IndexRange {
        if self.newest_first {
            IndexRange::newest(self.start_index, self.end_index)
        } else {
            IndexRange::new(self.start_index, self.end_index)
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserArgs {
    user_id: PrimaryKey,
}

#[derive(Deserialize)]
struct UsernameArgs {
    username: String,
}

#[derive(Deserialize)]
struct RoomNameArgs {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeRoomOwnerArgs {
    room_id: PrimaryKey,
    new_owner_id: PrimaryKey,
    current_owner_id: PrimaryKey,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRoomArgs {
    room_id: PrimaryKey,
    owner_id: PrimaryKey,
}

fn parse<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        arguments => arguments,
    };

    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidParams(e.to_string()))
}

/// Pulls a field that the schema marks as required for this tool.
fn required<T>(value: Option<T>, field: &str) -> Result<T, ToolError> {
    value.ok_or_else(|| ToolError::InvalidParams(format!("Missing required field: {field}")))
}

impl<Db> ToolDispatcher<Db>
where
    Db: ChatStore + ?Sized,
{
    pub(super) async fn handle(
        &self,
        name: &str,
        arguments: Value,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        match name {
            SEND_MESSAGE => self.send_message(parse(arguments)?, caller).await,
            CREATE_ROOM => self.create_room(parse(arguments)?, caller).await,
            JOIN_ROOM => self.join_room(parse(arguments)?, caller).await,
            LEAVE_ROOM => self.leave_room(parse(arguments)?, caller).await,
            SEND_ROOM_MESSAGE => self.send_room_message(parse(arguments)?, caller).await,
            GET_USERS_BY_TIME_RANGE => self.users_by_time_range(parse(arguments)?).await,
            GET_ROOMS_BY_TIME_RANGE => self.rooms_by_time_range(parse(arguments)?).await,
            GET_MESSAGES_BY_TIME_RANGE => {
                self.messages_by_time_range(parse(arguments)?, caller).await
            }
            GET_ROOM_MESSAGES_BY_TIME_RANGE => {
                self.room_messages_by_time_range(parse(arguments)?, caller)
                    .await
            }
            GET_USERS_BY_INDEX_RANGE => self.users_by_index_range(parse(arguments)?).await,
            GET_ROOMS_BY_INDEX_RANGE => self.rooms_by_index_range(parse(arguments)?).await,
            GET_MESSAGES_BY_INDEX_RANGE => {
                self.messages_by_index_range(parse(arguments)?, caller).await
            }
            GET_MESSAGES_BETWEEN_USERS_BY_INDEX_RANGE => {
                self.conversation_by_index_range(parse(arguments)?, caller)
                    .await
            }
            GET_ROOM_MESSAGES_BY_INDEX_RANGE => {
                self.room_messages_by_index_range(parse(arguments)?, caller)
                    .await
            }
            GET_USER_ROOMS => self.user_rooms(parse(arguments)?, caller).await,
            GET_USER_BY_USERNAME => self.user_by_username(parse(arguments)?).await,
            GET_ROOM_BY_NAME => self.room_by_name(parse(arguments)?).await,
            CHANGE_ROOM_OWNER => self.change_room_owner(parse(arguments)?, caller).await,
            DELETE_ROOM => self.delete_room(parse(arguments)?, caller).await,
            DELETE_USER => self.delete_user(parse(arguments)?, caller).await,
            _ => Err(ToolError::UnknownTool(name.to_string())),
        }
    }

    fn database(&self) -> &Db {
        &self.context.database
    }

    async fn send_message(
        &self,
        args: SendMessageArgs,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        let new_message = NewDirectMessage::new(
            caller.user_id,
            args.other_user_id,
            args.content,
            args.client_message_id,
        )
        .ok_or_else(|| {
            ToolError::InvalidParams("otherUserId must be someone other than the sender".into())
        })?;

        let message = self.database().create_direct_message(new_message).await?;
        let output = to_value(&message);

        self.context.emit(ChatEvent::DirectMessageSent { message });
        Ok(ToolOutput::Json(output))
    }

    async fn create_room(
        &self,
        args: CreateRoomArgs,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        let room = self
            .database()
            .create_room(NewRoom {
                name: args.name,
                description: args.description,
                owner_id: caller.user_id,
            })
            .await?;

        info!("{} created room {} ({})", caller.username, room.name, room.id);

        let output = to_value(&room);
        self.context.emit(ChatEvent::RoomCreated { room });

        Ok(ToolOutput::Json(output))
    }

    async fn join_room(
        &self,
        args: RoomArgs,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        let room = self.database().join_room(args.room_id, caller.user_id).await?;
        let output = json!({ "success": true, "room": to_value(&room) });

        self.context.emit(ChatEvent::UserJoined {
            room,
            user_id: caller.user_id,
        });

        Ok(ToolOutput::Json(output))
    }

    async fn leave_room(
        &self,
        args: RoomArgs,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        let room = self.database().leave_room(args.room_id, caller.user_id).await?;
        let output = json!({ "success": true, "room": to_value(&room) });

        self.context.emit(ChatEvent::UserLeft {
            room,
            user_id: caller.user_id,
        });

        Ok(ToolOutput::Json(output))
    }

    async fn send_room_message(
        &self,
        args: SendRoomMessageArgs,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        guard::require_member(self.database(), caller, args.room_id).await?;

        let message = self
            .database()
            .create_room_message(NewRoomMessage {
                room_id: args.room_id,
                sender_id: caller.user_id,
                content: args.content,
                client_message_id: args.client_message_id,
            })
            .await?;

        let member_ids = self.database().room_member_ids(args.room_id).await?;
        let output = to_value(&message);

        self.context.emit(ChatEvent::RoomMessageSent {
            message,
            member_ids,
        });

        Ok(ToolOutput::Json(output))
    }

    async fn users_by_time_range(&self, args: TimeRangeArgs) -> Result<ToolOutput, ToolError> {
        let users = self.database().users_created_between(args.range()).await?;
        Ok(ToolOutput::Json(to_value(&users)))
    }

    async fn rooms_by_time_range(&self, args: TimeRangeArgs) -> Result<ToolOutput, ToolError> {
        let rooms = self.database().rooms_created_between(args.range()).await?;
        Ok(ToolOutput::Json(to_value(&rooms)))
    }

    async fn messages_by_time_range(
        &self,
        args: TimeRangeArgs,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        let user_id = required(args.user_id, "userId")?;
        guard::require_self(caller, user_id, "messages")?;

        let messages = self
            .database()
            .user_direct_messages_between(user_id, args.range())
            .await?;

        Ok(ToolOutput::Json(to_value(&messages)))
    }

    async fn room_messages_by_time_range(
        &self,
        args: TimeRangeArgs,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        let room_id = required(args.room_id, "roomId")?;
        guard::require_member(self.database(), caller, room_id).await?;

        let messages = self
            .database()
            .room_messages_between(room_id, args.range())
            .await?;

        Ok(ToolOutput::Json(to_value(&messages)))
    }

    async fn users_by_index_range(&self, args: IndexRangeArgs) -> Result<ToolOutput, ToolError> {
        let users = self.database().list_users(args.range()).await?;
        Ok(ToolOutput::Json(to_value(&users)))
    }

    async fn rooms_by_index_range(&self, args: IndexRangeArgs) -> Result<ToolOutput, ToolError> {
        let rooms = self.database().list_rooms(args.range()).await?;
        Ok(ToolOutput::Json(to_value(&rooms)))
    }

    async fn messages_by_index_range(
        &self,
        args: IndexRangeArgs,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        let user_id = required(args.user_id, "userId")?;
        guard::require_self(caller, user_id, "messages")?;

        let messages = self
            .database()
            .user_direct_messages(user_id, args.range())
            .await?;

        Ok(ToolOutput::Json(to_value(&messages)))
    }

    async fn conversation_by_index_range(
        &self,
        args: IndexRangeArgs,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        let user_a = required(args.user_a, "userA")?;
        let user_b = required(args.user_b, "userB")?;

        let conversation = ConversationKey::new(user_a, user_b).ok_or_else(|| {
            ToolError::InvalidParams("userA and userB must be different users".into())
        })?;
        guard::require_participant(caller, &conversation)?;

        let messages = self
            .database()
            .conversation_messages(conversation, args.range())
            .await?;

        Ok(ToolOutput::Json(to_value(&messages)))
    }

    async fn room_messages_by_index_range(
        &self,
        args: IndexRangeArgs,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        let room_id = required(args.room_id, "roomId")?;
        guard::require_member(self.database(), caller, room_id).await?;

        let messages = self
            .database()
            .room_messages(room_id, args.range())
            .await?;

        Ok(ToolOutput::Json(to_value(&messages)))
    }

    async fn user_rooms(
        &self,
        args: UserArgs,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        guard::require_self(caller, args.user_id, "rooms")?;

        let rooms = self.database().user_rooms(args.user_id).await?;
        Ok(ToolOutput::Json(to_value(&rooms)))
    }

    async fn user_by_username(&self, args: UsernameArgs) -> Result<ToolOutput, ToolError> {
        let user = self.database().user_by_username(&args.username).await?;
        Ok(ToolOutput::Json(to_value(&user)))
    }

    async fn room_by_name(&self, args: RoomNameArgs) -> Result<ToolOutput, ToolError> {
        let room = self.database().room_by_name(&args.name).await?;
        Ok(ToolOutput::Json(to_value(&room)))
    }

    async fn change_room_owner(
        &self,
        args: ChangeRoomOwnerArgs,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        let room = guard::require_owner(
            self.database(),
            caller,
            args.room_id,
            args.current_owner_id,
            "transfer ownership",
        )
        .await?;

        let updated = self
            .database()
            .change_room_owner(room.id, args.new_owner_id)
            .await?;

        info!(
            "Room {} changed owner from {} to {}",
            updated.id, room.owner_id, updated.owner_id
        );

        let output = json!({
            "success": true,
            "room": to_value(&updated),
            "message": "Room ownership changed successfully",
        });

        self.context.emit(ChatEvent::RoomOwnerChanged {
            room: updated,
            previous_owner_id: room.owner_id,
        });

        Ok(ToolOutput::Json(output))
    }

    async fn delete_room(
        &self,
        args: DeleteRoomArgs,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        let room = guard::require_owner(
            self.database(),
            caller,
            args.room_id,
            args.owner_id,
            "delete the room",
        )
        .await?;

        self.database().delete_room(room.id).await?;
        info!("{} deleted room {} ({})", caller.username, room.name, room.id);

        self.context.emit(ChatEvent::RoomDeleted { room_id: room.id });

        Ok(ToolOutput::Json(json!({
            "success": true,
            "message": "Room deleted successfully",
        })))
    }

    async fn delete_user(
        &self,
        args: UserArgs,
        caller: &CallerIdentity,
    ) -> Result<ToolOutput, ToolError> {
        guard::require_admin(self.database(), caller).await?;

        let deleted_room_ids = self.database().delete_user(args.user_id).await?;
        info!("{} deleted user {}", caller.username, args.user_id);

        let output = json!({
            "success": true,
            "deletedRoomIds": deleted_room_ids,
        });

        self.context.emit(ChatEvent::UserDeleted {
            user_id: args.user_id,
            deleted_room_ids,
        });

        Ok(ToolOutput::Json(output))
    }
}
