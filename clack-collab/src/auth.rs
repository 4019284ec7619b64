use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use clack_core::random_string;
use log::{info, warn};
use rand::rngs::OsRng;
use thiserror::Error;

use crate::{
    ChatEvent, ChatStore, CollabContext, DatabaseError, NewSession, NewUser, PrimaryKey,
    SessionData, UserData,
};

pub const DEFAULT_SESSION_DAYS: i64 = 7;

pub struct Auth<Db: ?Sized> {
    context: CollabContext<Db>,
    argon: Argon2<'static>,
    session_days: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("A superuser already exists")]
    SuperuserExists,
    /// The session token doesn't exist or has expired
    #[error("Session not found")]
    SessionNotFound,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
}

/// The verified identity a request acts as. Tool handlers only ever trust this,
/// never an id that came in with the arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: PrimaryKey,
    pub username: String,
    pub superuser: bool,
}

impl From<&UserData> for CallerIdentity {
    fn from(user: &UserData) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            superuser: user.superuser,
        }
    }
}

impl<Db> Auth<Db>
where
    Db: ChatStore + ?Sized,
{
    pub fn new(context: &CollabContext<Db>, session_days: i64) -> Self {
        Self {
            context: context.clone(),
            argon: Argon2::default(),
            session_days,
        }
    }

    /// Logs in a user, returning a new session
    pub async fn login(&self, credentials: Credentials) -> Result<SessionData, AuthError> {
        self.clear_expired().await;

        let user = self.verify(&credentials).await?;
        let expires_at = Utc::now() + Duration::days(self.session_days);

        let new_session = NewSession {
            token: random_string(32),
            user_id: user.id,
            expires_at,
        };

        self.context
            .database
            .create_session(new_session)
            .await
            .map_err(AuthError::Db)
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        self.context.database.delete_session_by_token(token).await
    }

    /// Checks a username and password without creating a session
    pub async fn authenticate(&self, credentials: Credentials) -> Result<CallerIdentity, AuthError> {
        self.verify(&credentials)
            .await
            .map(|user| CallerIdentity::from(&user))
    }

    /// Resolves a session token to the identity it belongs to
    pub async fn session(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        let session = self
            .context
            .database
            .session_by_token(token)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => AuthError::SessionNotFound,
                e => AuthError::Db(e),
            })?;

        if session.expires_at <= Utc::now() {
            return Err(AuthError::SessionNotFound);
        }

        Ok(CallerIdentity::from(&session.user))
    }

    /// Creates a basic user
    pub async fn register_basic(&self, new_user: NewPlainUser) -> Result<UserData, AuthError> {
        self.create_user(new_user, false).await
    }

    /// Creates a superuser, if it doesn't already exist
    pub async fn register_superuser(&self, new_user: NewPlainUser) -> Result<UserData, AuthError> {
        let has_superuser = self
            .context
            .database
            .check_for_superuser()
            .await
            .map_err(AuthError::Db)?;

        if has_superuser {
            return Err(AuthError::SuperuserExists);
        }

        self.create_user(new_user, true).await
    }

    async fn verify(&self, credentials: &Credentials) -> Result<UserData, AuthError> {
        let user = self
            .context
            .database
            .user_by_username(&credentials.username)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => AuthError::InvalidCredentials,
                err => AuthError::Db(err),
            })?;

        let stored_password = PasswordHash::parse(&user.password, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(credentials.password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)?;

        Ok(user)
    }

    async fn create_user(&self, new_user: NewPlainUser, superuser: bool) -> Result<UserData, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hashed_password = self
            .argon
            .hash_password(new_user.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        let user = self
            .context
            .database
            .create_user(NewUser {
                username: new_user.username,
                password: hashed_password,
                superuser,
            })
            .await
            .map_err(AuthError::Db)?;

        info!("Registered user {} ({})", user.username, user.id);
        self.context.emit(ChatEvent::UserRegistered { user: user.clone() });

        Ok(user)
    }

    async fn clear_expired(&self) {
        if let Err(e) = self.context.database.clear_expired_sessions().await {
            warn!("Could not clear expired sessions: {e}");
        }
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewPlainUser {
    pub username: String,
    pub password: String,
}
