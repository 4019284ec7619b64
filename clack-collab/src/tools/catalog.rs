use clack_core::{FieldSchema, InputSchema, StringFormat, Tool, ToolRegistry};

pub const SEND_MESSAGE: &str = "send_message";
pub const CREATE_ROOM: &str = "create_room";
pub const JOIN_ROOM: &str = "join_room";
pub const LEAVE_ROOM: &str = "leave_room";
pub const SEND_ROOM_MESSAGE: &str = "send_room_message";
pub const GET_USERS_BY_TIME_RANGE: &str = "get_users_by_time_range";
pub const GET_ROOMS_BY_TIME_RANGE: &str = "get_rooms_by_time_range";
pub const GET_MESSAGES_BY_TIME_RANGE: &str = "get_messages_by_time_range";
pub const GET_ROOM_MESSAGES_BY_TIME_RANGE: &str = "get_room_messages_by_time_range";
pub const GET_USERS_BY_INDEX_RANGE: &str = "get_users_by_index_range";
pub const GET_ROOMS_BY_INDEX_RANGE: &str = "get_rooms_by_index_range";
pub const GET_MESSAGES_BY_INDEX_RANGE: &str = "get_messages_by_index_range";
pub const GET_MESSAGES_BETWEEN_USERS_BY_INDEX_RANGE: &str =
    "get_messages_between_users_by_index_range";
pub const GET_ROOM_MESSAGES_BY_INDEX_RANGE: &str = "get_room_messages_by_index_range";
pub const GET_USER_ROOMS: &str = "get_user_rooms";
pub const GET_USER_BY_USERNAME: &str = "get_user_by_username";
pub const GET_ROOM_BY_NAME: &str = "get_room_by_name";
pub const CHANGE_ROOM_OWNER: &str = "change_room_owner";
pub const DELETE_ROOM: &str = "delete_room";
pub const DELETE_USER: &str = "delete_user";

pub const MAX_CONTENT_LENGTH: usize = 1000;
pub const MAX_ROOM_NAME_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 500;
pub const MAX_USERNAME_LENGTH: usize = 64;
pub const MAX_CLIENT_MESSAGE_ID_LENGTH: usize = 64;

fn id(description: &str) -> FieldSchema {
    FieldSchema::integer(description).minimum(1.)
}

fn content() -> FieldSchema {
    FieldSchema::string("Message content")
        .min_length(1)
        .max_length(MAX_CONTENT_LENGTH)
}

fn client_message_id() -> FieldSchema {
    FieldSchema::string("Client-generated id echoed back in the message, used to match optimistic copies")
        .min_length(1)
        .max_length(MAX_CLIENT_MESSAGE_ID_LENGTH)
}

fn time(description: &str) -> FieldSchema {
    FieldSchema::string(description).format(StringFormat::DateTime)
}

fn time_range() -> InputSchema {
    InputSchema::new()
        .required("startTime", time("Start time in ISO format"))
        .required("endTime", time("End time in ISO format"))
}

fn index_range() -> InputSchema {
    InputSchema::new()
        .required(
            "startIndex",
            FieldSchema::integer("Start index (0-based)").minimum(0.),
        )
        .required(
            "endIndex",
            FieldSchema::integer("End index (exclusive)").minimum(1.),
        )
}

fn newest_first() -> FieldSchema {
    FieldSchema::boolean("Count the range back from the newest message, for scrolling up")
}

/// Every tool the chat service exposes, in a stable order.
pub fn chat_tools() -> ToolRegistry {
    ToolRegistry::new()
        .with(Tool::new(
            SEND_MESSAGE,
            "Send a message between two users",
            InputSchema::new()
                .required("otherUserId", id("ID of the other user"))
                .required("content", content())
                .optional("clientMessageId", client_message_id()),
        ))
        .with(Tool::new(
            CREATE_ROOM,
            "Create a new chat room",
            InputSchema::new()
                .required(
                    "name",
                    FieldSchema::string("Room name")
                        .min_length(1)
                        .max_length(MAX_ROOM_NAME_LENGTH),
                )
                .optional(
                    "description",
                    FieldSchema::string("Room description").max_length(MAX_DESCRIPTION_LENGTH),
                ),
        ))
        .with(Tool::new(
            JOIN_ROOM,
            "Join a chat room",
            InputSchema::new().required("roomId", id("ID of the room to join")),
        ))
        .with(Tool::new(
            LEAVE_ROOM,
            "Leave a chat room",
            InputSchema::new().required("roomId", id("ID of the room to leave")),
        ))
        .with(Tool::new(
            SEND_ROOM_MESSAGE,
            "Send a message to a room",
            InputSchema::new()
                .required("roomId", id("ID of the room"))
                .required("content", content())
                .optional("clientMessageId", client_message_id()),
        ))
        .with(Tool::new(
            GET_USERS_BY_TIME_RANGE,
            "Get users created within a time range",
            time_range(),
        ))
        .with(Tool::new(
            GET_ROOMS_BY_TIME_RANGE,
            "Get rooms created within a time range",
            time_range(),
        ))
        .with(Tool::new(
            GET_MESSAGES_BY_TIME_RANGE,
            "Get messages sent within a time range",
            time_range().required("userId", id("User ID to filter messages for")),
        ))
        .with(Tool::new(
            GET_ROOM_MESSAGES_BY_TIME_RANGE,
            "Get room messages sent within a time range",
            time_range().required("roomId", id("Room ID to filter messages for")),
        ))
        .with(Tool::new(
            GET_USERS_BY_INDEX_RANGE,
            "Get users by index range (for pagination)",
            index_range(),
        ))
        .with(Tool::new(
            GET_ROOMS_BY_INDEX_RANGE,
            "Get rooms by index range (for pagination)",
            index_range(),
        ))
        .with(Tool::new(
            GET_MESSAGES_BY_INDEX_RANGE,
            "Get messages by index range (for pagination)",
            index_range().required("userId", id("User ID to filter messages for")),
        ))
        .with(Tool::new(
            GET_MESSAGES_BETWEEN_USERS_BY_INDEX_RANGE,
            "Get messages between two specific users by index range (for pagination)",
            index_range()
                .required("userA", id("First user ID"))
                .required("userB", id("Second user ID"))
                .optional("newestFirst", newest_first()),
        ))
        .with(Tool::new(
            GET_ROOM_MESSAGES_BY_INDEX_RANGE,
            "Get room messages by index range (for pagination)",
            index_range()
                .required("roomId", id("Room ID to filter messages for"))
                .optional("newestFirst", newest_first()),
        ))
        .with(Tool::new(
            GET_USER_ROOMS,
            "Get rooms that a user is a member of",
            InputSchema::new().required("userId", id("User ID")),
        ))
        .with(Tool::new(
            GET_USER_BY_USERNAME,
            "Look up a user by username",
            InputSchema::new().required(
                "username",
                FieldSchema::string("Username")
                    .min_length(1)
                    .max_length(MAX_USERNAME_LENGTH),
            ),
        ))
        .with(Tool::new(
            GET_ROOM_BY_NAME,
            "Look up a room by name",
            InputSchema::new().required(
                "name",
                FieldSchema::string("Room name")
                    .min_length(1)
                    .max_length(MAX_ROOM_NAME_LENGTH),
            ),
        ))
        .with(Tool::new(
            CHANGE_ROOM_OWNER,
            "Change the owner of a room (only current owner can do this)",
            InputSchema::new()
                .required("roomId", id("Room ID"))
                .required("newOwnerId", id("New owner user ID"))
                .required(
                    "currentOwnerId",
                    id("Current owner user ID (for verification)"),
                ),
        ))
        .with(Tool::new(
            DELETE_ROOM,
            "Delete a room (only owner can do this)",
            InputSchema::new()
                .required("roomId", id("Room ID"))
                .required("ownerId", id("Owner user ID (for verification)")),
        ))
        .with(Tool::new(
            DELETE_USER,
            "Delete a user and everything they own (administrators only)",
            InputSchema::new().required("userId", id("ID of the user to delete")),
        ))
}
