//! Entitlement checks run after validation and before any mutation.
//!
//! Claims that arrive in arguments are compared against the caller identity first;
//! ownership and membership are then read from the store at call time.

use clack_core::ConversationKey;

use super::ToolError;
use crate::{CallerIdentity, ChatStore, PrimaryKey, RoomData};

/// The caller may only act as themselves.
pub fn require_self(
    caller: &CallerIdentity,
    claimed_user_id: PrimaryKey,
    what: &str,
) -> Result<(), ToolError> {
    if caller.user_id != claimed_user_id {
        return Err(ToolError::Unauthorized(format!(
            "You can only access your own {what}"
        )));
    }

    Ok(())
}

/// The caller must be one of the two participants of a conversation.
pub fn require_participant(
    caller: &CallerIdentity,
    conversation: &ConversationKey,
) -> Result<(), ToolError> {
    if !conversation.contains(caller.user_id) {
        return Err(ToolError::Unauthorized(
            "You can only access messages in conversations you participate in".to_string(),
        ));
    }

    Ok(())
}

/// Checks a claimed owner against the caller, then against the room as stored right now.
pub async fn require_owner<Db: ChatStore + ?Sized>(
    database: &Db,
    caller: &CallerIdentity,
    room_id: PrimaryKey,
    claimed_owner_id: PrimaryKey,
    action: &str,
) -> Result<RoomData, ToolError> {
    let denied = || ToolError::Unauthorized(format!("Only the current room owner can {action}"));

    if claimed_owner_id != caller.user_id {
        return Err(denied());
    }

    let room = database.room_by_id(room_id).await?;

    if room.owner_id != caller.user_id {
        return Err(denied());
    }

    Ok(room)
}

/// The room must exist and the caller must currently be a member of it.
pub async fn require_member<Db: ChatStore + ?Sized>(
    database: &Db,
    caller: &CallerIdentity,
    room_id: PrimaryKey,
) -> Result<RoomData, ToolError> {
    let room = database.room_by_id(room_id).await?;

    if !database.is_room_member(room_id, caller.user_id).await? {
        return Err(ToolError::Unauthorized(
            "You must be a member of this room".to_string(),
        ));
    }

    Ok(room)
}

/// The caller must currently hold the administrator capability.
pub async fn require_admin<Db: ChatStore + ?Sized>(
    database: &Db,
    caller: &CallerIdentity,
) -> Result<(), ToolError> {
    let current = database.user_by_id(caller.user_id).await;

    match current {
        Ok(user) if user.superuser => Ok(()),
        Ok(_) => Err(ToolError::Unauthorized(
            "Only administrators can do this".to_string(),
        )),
        Err(e) if e.is_not_found() => Err(ToolError::Unauthorized(
            "Only administrators can do this".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}
