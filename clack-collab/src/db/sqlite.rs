use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clack_core::ConversationKey;
use sqlx::{
    query, query_as,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError, FromRow, SqlitePool,
};
use std::{str::FromStr, time::Duration};

use crate::{
    ChatStore, DatabaseError, DatabaseResult, DirectMessage, IndexRange, IntoDatabaseError,
    MessageData, NewDirectMessage, NewRoom, NewRoomMessage, NewSession, NewUser, PrimaryKey,
    Result, RoomData, RoomMessage, SessionData, TimeRange, UserData,
};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        superuser BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        token TEXT NOT NULL UNIQUE,
        user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        expires_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS rooms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        owner_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS room_members (
        room_id INTEGER NOT NULL REFERENCES rooms (id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        joined_at TEXT NOT NULL,
        PRIMARY KEY (room_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_a INTEGER REFERENCES users (id) ON DELETE CASCADE,
        user_b INTEGER REFERENCES users (id) ON DELETE CASCADE,
        room_id INTEGER REFERENCES rooms (id) ON DELETE CASCADE,
        sender_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        client_message_id TEXT,
        created_at TEXT NOT NULL,
        CHECK ((room_id IS NULL) = (user_a IS NOT NULL AND user_b IS NOT NULL)),
        CHECK (user_a IS NULL OR user_a < user_b)
    )",
    "CREATE INDEX IF NOT EXISTS messages_conversation ON messages (user_a, user_b, created_at)",
    "CREATE INDEX IF NOT EXISTS messages_room ON messages (room_id, created_at)",
];

const SELECT_ROOM: &str = "
    SELECT
        rooms.id,
        rooms.name,
        rooms.description,
        rooms.owner_id,
        users.username AS owner_username,
        rooms.created_at,
        (SELECT COUNT(*) FROM room_members WHERE room_members.room_id = rooms.id) AS member_count
    FROM rooms
        INNER JOIN users ON rooms.owner_id = users.id";

const SELECT_MESSAGE: &str = "
    SELECT
        messages.id,
        messages.user_a,
        messages.user_b,
        messages.room_id,
        messages.sender_id,
        users.username AS sender_name,
        messages.content,
        messages.client_message_id,
        messages.created_at
    FROM messages
        INNER JOIN users ON messages.sender_id = users.id";

/// A sqlite database implementation for clack
pub struct SqliteDatabase {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct UserRow {
    id: PrimaryKey,
    username: String,
    password: String,
    superuser: bool,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SessionRow {
    id: PrimaryKey,
    token: String,
    user_id: PrimaryKey,
    expires_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct RoomRow {
    id: PrimaryKey,
    name: String,
    description: String,
    owner_id: PrimaryKey,
    owner_username: String,
    created_at: DateTime<Utc>,
    member_count: i64,
}

#[derive(FromRow)]
struct MessageRow {
    id: PrimaryKey,
    user_a: Option<PrimaryKey>,
    user_b: Option<PrimaryKey>,
    room_id: Option<PrimaryKey>,
    sender_id: PrimaryKey,
    sender_name: String,
    content: String,
    client_message_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for UserData {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password: row.password,
            superuser: row.superuser,
            created_at: row.created_at,
        }
    }
}

impl From<RoomRow> for RoomData {
    fn from(row: RoomRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            owner_id: row.owner_id,
            owner_username: row.owner_username,
            created_at: row.created_at,
            member_count: row.member_count.max(0) as u32,
        }
    }
}

impl TryFrom<MessageRow> for MessageData {
    type Error = DatabaseError;

    fn try_from(row: MessageRow) -> Result<Self> {
        let id = row.id;

        MessageData::from_columns(
            row.id,
            row.user_a,
            row.user_b,
            row.room_id,
            row.sender_id,
            row.sender_name,
            row.content,
            row.client_message_id,
            row.created_at,
        )
        .ok_or_else(|| DatabaseError::Internal(format!("message {id} has an invalid target").into()))
    }
}

fn into_direct_messages(rows: Vec<MessageRow>) -> Result<Vec<DirectMessage>> {
    rows.into_iter()
        .map(|row| match MessageData::try_from(row)? {
            MessageData::Direct(message) => Ok(message),
            MessageData::Room(m) => Err(DatabaseError::Internal(
                format!("message {} is not a direct message", m.id).into(),
            )),
        })
        .collect()
}

fn into_room_messages(rows: Vec<MessageRow>) -> Result<Vec<RoomMessage>> {
    rows.into_iter()
        .map(|row| match MessageData::try_from(row)? {
            MessageData::Room(message) => Ok(message),
            MessageData::Direct(m) => Err(DatabaseError::Internal(
                format!("message {} is not a room message", m.id).into(),
            )),
        })
        .collect()
}

fn limit_offset(range: IndexRange) -> (i64, i64) {
    (range.len() as i64, range.start as i64)
}

impl SqliteDatabase {
    /// Connects to the database at `url` and creates the schema if needed.
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| e.any())?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database is a separate database
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);

        if max_connections == 1 {
            pool_options = pool_options
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| e.any())?;

        for statement in SCHEMA {
            query(statement)
                .execute(&pool)
                .await
                .map_err(|e| e.any())?;
        }

        Ok(Self { pool })
    }

    async fn message_by_id(&self, message_id: PrimaryKey) -> Result<MessageData> {
        let sql = format!("{SELECT_MESSAGE} WHERE messages.id = ?");

        query_as::<_, MessageRow>(&sql)
            .bind(message_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("message", "id", message_id))?
            .try_into()
    }

    /// Runs a room listing. The last two binds are the limit and offset.
    async fn rooms_matching(&self, filter: &str, bind: Vec<BindValue>) -> Result<Vec<RoomData>> {
        let sql =
            format!("{SELECT_ROOM} {filter} ORDER BY rooms.created_at, rooms.id LIMIT ? OFFSET ?");
        let mut statement = query_as::<_, RoomRow>(&sql);

        for value in bind {
            statement = match value {
                BindValue::Int(v) => statement.bind(v),
                BindValue::Time(v) => statement.bind(v),
            };
        }

        let rows = statement.fetch_all(&self.pool).await.map_err(|e| e.any())?;
        Ok(rows.into_iter().map(RoomData::from).collect())
    }

    /// Runs a message listing. The last two binds are the limit and offset.
    async fn messages_matching(
        &self,
        filter: &str,
        bind: Vec<BindValue>,
        newest_first: bool,
    ) -> Result<Vec<MessageRow>> {
        let order = if newest_first {
            "messages.created_at DESC, messages.id DESC"
        } else {
            "messages.created_at, messages.id"
        };

        let sql = format!("{SELECT_MESSAGE} {filter} ORDER BY {order} LIMIT ? OFFSET ?");
        let mut statement = query_as::<_, MessageRow>(&sql);

        for value in bind {
            statement = match value {
                BindValue::Int(v) => statement.bind(v),
                BindValue::Time(v) => statement.bind(v),
            };
        }

        let mut rows = statement.fetch_all(&self.pool).await.map_err(|e| e.any())?;

        if newest_first {
            rows.reverse();
        }

        Ok(rows)
    }
}

enum BindValue {
    Int(i64),
    Time(DateTime<Utc>),
}

/// Binds that select everything, for listings that aren't paged
const UNBOUNDED: [BindValue; 2] = [BindValue::Int(-1), BindValue::Int(0)];

#[async_trait]
impl ChatStore for SqliteDatabase {
    async fn check_for_superuser(&self) -> Result<bool> {
        let result = query("SELECT id FROM users WHERE superuser = TRUE")
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(SqlxError::RowNotFound) => Ok(false),
            Err(e) => Err(e.any()),
        }
    }

    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map(UserData::from)
            .map_err(|e| e.not_found_or("user", "id", user_id))
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map(UserData::from)
            .map_err(|e| e.not_found_or("user", "username", username))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_username(&new_user.username)
            .await
            .conflict_or_ok("user", "username", &new_user.username)?;

        query_as::<_, UserRow>(
            "INSERT INTO users (username, password, superuser, created_at) VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(&new_user.username)
        .bind(&new_user.password)
        .bind(new_user.superuser)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map(UserData::from)
        .map_err(|e| e.conflict_or("user", "username", &new_user.username))
    }

    async fn list_users(&self, range: IndexRange) -> Result<Vec<UserData>> {
        let (limit, offset) = limit_offset(range);

        let rows = query_as::<_, UserRow>(
            "SELECT * FROM users ORDER BY created_at, id LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(UserData::from).collect())
    }

    async fn users_created_between(&self, range: TimeRange) -> Result<Vec<UserData>> {
        let rows = query_as::<_, UserRow>(
            "SELECT * FROM users WHERE created_at >= ? AND created_at <= ? ORDER BY created_at, id",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(UserData::from).collect())
    }

    async fn delete_user(&self, user_id: PrimaryKey) -> Result<Vec<PrimaryKey>> {
        // Ensure user exists
        let _ = self.user_by_id(user_id).await?;

        let owned: Vec<(PrimaryKey,)> = query_as("SELECT id FROM rooms WHERE owner_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(owned.into_iter().map(|(id,)| id).collect())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row = query_as::<_, SessionRow>("SELECT * FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("session", "token", "<redacted>"))?;

        Ok(SessionData {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user: self.user_by_id(row.user_id).await?,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let user = self.user_by_id(new_session.user_id).await?;

        let row = query_as::<_, SessionRow>(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(&new_session.token)
        .bind(new_session.user_id)
        .bind(new_session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(SessionData {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user,
        })
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let result = query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("session", "token", "<redacted>"));
        }

        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData> {
        let sql = format!("{SELECT_ROOM} WHERE rooms.id = ?");

        query_as::<_, RoomRow>(&sql)
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map(RoomData::from)
            .map_err(|e| e.not_found_or("room", "id", room_id))
    }

    async fn room_by_name(&self, name: &str) -> Result<RoomData> {
        let sql = format!("{SELECT_ROOM} WHERE rooms.name = ?");

        query_as::<_, RoomRow>(&sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map(RoomData::from)
            .map_err(|e| e.not_found_or("room", "name", name))
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        self.room_by_name(&new_room.name)
            .await
            .conflict_or_ok("room", "name", &new_room.name)?;
        let _ = self.user_by_id(new_room.owner_id).await?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let (room_id,): (PrimaryKey,) = query_as(
            "INSERT INTO rooms (name, description, owner_id, created_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&new_room.name)
        .bind(&new_room.description)
        .bind(new_room.owner_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| e.conflict_or("room", "name", &new_room.name))?;

        query("INSERT INTO room_members (room_id, user_id, joined_at) VALUES (?, ?, ?)")
            .bind(room_id)
            .bind(new_room.owner_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

        self.room_by_id(room_id).await
    }

    async fn list_rooms(&self, range: IndexRange) -> Result<Vec<RoomData>> {
        let (limit, offset) = limit_offset(range);

        self.rooms_matching("", vec![BindValue::Int(limit), BindValue::Int(offset)])
            .await
    }

    async fn rooms_created_between(&self, range: TimeRange) -> Result<Vec<RoomData>> {
        let mut bind = vec![BindValue::Time(range.start), BindValue::Time(range.end)];
        bind.extend(UNBOUNDED);

        self.rooms_matching(
            "WHERE rooms.created_at >= ? AND rooms.created_at <= ?",
            bind,
        )
        .await
    }

    async fn user_rooms(&self, user_id: PrimaryKey) -> Result<Vec<RoomData>> {
        let _ = self.user_by_id(user_id).await?;

        let mut bind = vec![BindValue::Int(user_id)];
        bind.extend(UNBOUNDED);

        self.rooms_matching(
            "WHERE rooms.id IN (SELECT room_id FROM room_members WHERE user_id = ?)",
            bind,
        )
        .await
    }

    async fn room_member_ids(&self, room_id: PrimaryKey) -> Result<Vec<PrimaryKey>> {
        let _ = self.room_by_id(room_id).await?;

        let rows: Vec<(PrimaryKey,)> =
            query_as("SELECT user_id FROM room_members WHERE room_id = ? ORDER BY user_id")
                .bind(room_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn is_room_member(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<bool> {
        let row: Option<(PrimaryKey,)> =
            query_as("SELECT user_id FROM room_members WHERE room_id = ? AND user_id = ?")
                .bind(room_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| e.any())?;

        Ok(row.is_some())
    }

    async fn join_room(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<RoomData> {
        let _ = self.room_by_id(room_id).await?;
        let _ = self.user_by_id(user_id).await?;

        if self.is_room_member(room_id, user_id).await? {
            return Err(DatabaseError::conflict("room member", "user id", user_id));
        }

        query("INSERT INTO room_members (room_id, user_id, joined_at) VALUES (?, ?, ?)")
            .bind(room_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| e.conflict_or("room member", "user id", user_id))?;

        self.room_by_id(room_id).await
    }

    async fn leave_room(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<RoomData> {
        let _ = self.room_by_id(room_id).await?;

        let result = query("DELETE FROM room_members WHERE room_id = ? AND user_id = ?")
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("room member", "user id", user_id));
        }

        self.room_by_id(room_id).await
    }

    async fn change_room_owner(
        &self,
        room_id: PrimaryKey,
        new_owner_id: PrimaryKey,
    ) -> Result<RoomData> {
        let _ = self.room_by_id(room_id).await?;
        let _ = self.user_by_id(new_owner_id).await?;

        query("UPDATE rooms SET owner_id = ? WHERE id = ?")
            .bind(new_owner_id)
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.room_by_id(room_id).await
    }

    async fn delete_room(&self, room_id: PrimaryKey) -> Result<()> {
        // Ensure room exists
        let _ = self.room_by_id(room_id).await?;

        query("DELETE FROM rooms WHERE id = ?")
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn create_direct_message(&self, new_message: NewDirectMessage) -> Result<DirectMessage> {
        for user_id in new_message.conversation.participants() {
            let _ = self.user_by_id(user_id).await?;
        }

        let (message_id,): (PrimaryKey,) = query_as(
            "INSERT INTO messages (user_a, user_b, sender_id, content, client_message_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(new_message.conversation.user_a())
        .bind(new_message.conversation.user_b())
        .bind(new_message.sender_id)
        .bind(&new_message.content)
        .bind(&new_message.client_message_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        match self.message_by_id(message_id).await? {
            MessageData::Direct(message) => Ok(message),
            MessageData::Room(_) => Err(DatabaseError::Internal(
                format!("message {message_id} is not a direct message").into(),
            )),
        }
    }

    async fn create_room_message(&self, new_message: NewRoomMessage) -> Result<RoomMessage> {
        let _ = self.room_by_id(new_message.room_id).await?;
        let _ = self.user_by_id(new_message.sender_id).await?;

        let (message_id,): (PrimaryKey,) = query_as(
            "INSERT INTO messages (room_id, sender_id, content, client_message_id, created_at)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(new_message.room_id)
        .bind(new_message.sender_id)
        .bind(&new_message.content)
        .bind(&new_message.client_message_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        match self.message_by_id(message_id).await? {
            MessageData::Room(message) => Ok(message),
            MessageData::Direct(_) => Err(DatabaseError::Internal(
                format!("message {message_id} is not a room message").into(),
            )),
        }
    }

    async fn user_direct_messages(
        &self,
        user_id: PrimaryKey,
        range: IndexRange,
    ) -> Result<Vec<DirectMessage>> {
        let (limit, offset) = limit_offset(range);

        let rows = self
            .messages_matching(
                "WHERE messages.user_a = ? OR messages.user_b = ?",
                vec![
                    BindValue::Int(user_id),
                    BindValue::Int(user_id),
                    BindValue::Int(limit),
                    BindValue::Int(offset),
                ],
                range.newest_first,
            )
            .await?;

        into_direct_messages(rows)
    }

    async fn user_direct_messages_between(
        &self,
        user_id: PrimaryKey,
        range: TimeRange,
    ) -> Result<Vec<DirectMessage>> {
        let mut bind = vec![
            BindValue::Int(user_id),
            BindValue::Int(user_id),
            BindValue::Time(range.start),
            BindValue::Time(range.end),
        ];
        bind.extend(UNBOUNDED);

        let rows = self
            .messages_matching(
                "WHERE (messages.user_a = ? OR messages.user_b = ?)
                    AND messages.created_at >= ? AND messages.created_at <= ?",
                bind,
                false,
            )
            .await?;

        into_direct_messages(rows)
    }

    async fn conversation_messages(
        &self,
        conversation: ConversationKey,
        range: IndexRange,
    ) -> Result<Vec<DirectMessage>> {
        let (limit, offset) = limit_offset(range);

        let rows = self
            .messages_matching(
                "WHERE messages.user_a = ? AND messages.user_b = ?",
                vec![
                    BindValue::Int(conversation.user_a()),
                    BindValue::Int(conversation.user_b()),
                    BindValue::Int(limit),
                    BindValue::Int(offset),
                ],
                range.newest_first,
            )
            .await?;

        into_direct_messages(rows)
    }

    async fn room_messages(
        &self,
        room_id: PrimaryKey,
        range: IndexRange,
    ) -> Result<Vec<RoomMessage>> {
        let (limit, offset) = limit_offset(range);

        let rows = self
            .messages_matching(
                "WHERE messages.room_id = ?",
                vec![
                    BindValue::Int(room_id),
                    BindValue::Int(limit),
                    BindValue::Int(offset),
                ],
                range.newest_first,
            )
            .await?;

        into_room_messages(rows)
    }

    async fn room_messages_between(
        &self,
        room_id: PrimaryKey,
        range: TimeRange,
    ) -> Result<Vec<RoomMessage>> {
        let mut bind = vec![
            BindValue::Int(room_id),
            BindValue::Time(range.start),
            BindValue::Time(range.end),
        ];
        bind.extend(UNBOUNDED);

        let rows = self
            .messages_matching(
                "WHERE messages.room_id = ? AND messages.created_at >= ? AND messages.created_at <= ?",
                bind,
                false,
            )
            .await?;

        into_room_messages(rows)
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(
        self,
        resource: &'static str,
        identifier: &'static str,
        value: impl ToString,
    ) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::not_found(resource, identifier, value),
            e => Self::any(e),
        }
    }

    fn conflict_or(
        self,
        resource: &'static str,
        field: &'static str,
        value: impl ToString,
    ) -> DatabaseError {
        let unique = self
            .as_database_error()
            .map_or(false, |e| e.is_unique_violation());

        if unique {
            DatabaseError::conflict(resource, field, value)
        } else {
            self.any()
        }
    }
}
