use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use clack_collab::{CallerIdentity, Credentials, NewPlainUser, SessionData, ToSerialized};
use log::info;
use serde_json::{json, Value};

use crate::{
    errors::ServerResult,
    schemas::{LoginSchema, RegisterSchema, ValidatedJson},
    ServerContext,
};

/// The authenticated caller of a request.
///
/// Accepts a bearer token, a `token` query parameter (for EventSource clients that
/// can't set headers), or an `X-Username`/`X-Password` pair for agents.
pub struct Session(pub CallerIdentity);

impl Session {
    pub fn identity(&self) -> &CallerIdentity {
        &self.0
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|x| x.to_str().ok())
}

fn query_token(parts: &Parts) -> Option<String> {
    parts.uri.query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token" && !value.is_empty()).then(|| value.to_string())
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    ServerContext: FromRef<S>,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);
        let auth = &context.collab.auth;

        if let Some(authorization) = header_value(&parts.headers, header::AUTHORIZATION.as_str()) {
            let pieces: Vec<_> = authorization.split_ascii_whitespace().collect();

            if pieces.first() != Some(&"Bearer") {
                return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
            }

            let token = pieces.last().cloned().unwrap_or_default();

            return auth
                .session(token)
                .await
                .map(Self)
                .map_err(|_| (StatusCode::UNAUTHORIZED, "Session does not exist"));
        }

        if let Some(token) = query_token(parts) {
            return auth
                .session(&token)
                .await
                .map(Self)
                .map_err(|_| (StatusCode::UNAUTHORIZED, "Session does not exist"));
        }

        let username = header_value(&parts.headers, "x-username");
        let password = header_value(&parts.headers, "x-password");

        if let (Some(username), Some(password)) = (username, password) {
            let credentials = Credentials {
                username: username.to_string(),
                password: password.to_string(),
            };

            return auth
                .authenticate(credentials)
                .await
                .map(Self)
                .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid credentials"));
        }

        Err((
            StatusCode::UNAUTHORIZED,
            "Provide either a Bearer token or X-Username/X-Password headers",
        ))
    }
}

fn login_result(session: &SessionData) -> Value {
    json!({
        "success": true,
        "token": session.token,
        "expiresAt": session.expires_at,
        "user": session.user.to_serialized(),
    })
}

async fn register(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> ServerResult<Json<Value>> {
    let auth = &context.collab.auth;

    let user = auth
        .register_basic(NewPlainUser {
            username: body.username,
            password: body.password.clone(),
        })
        .await?;

    let session = auth
        .login(Credentials {
            username: user.username,
            password: body.password,
        })
        .await?;

    Ok(Json(login_result(&session)))
}

async fn login(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<Json<Value>> {
    let session = context
        .collab
        .auth
        .login(Credentials {
            username: body.username,
            password: body.password,
        })
        .await?;

    info!("{} logged in", session.user.username);

    Ok(Json(login_result(&session)))
}

async fn me(State(context): State<ServerContext>, session: Session) -> ServerResult<Json<Value>> {
    let user = context
        .collab
        .database
        .user_by_id(session.identity().user_id)
        .await?;

    Ok(Json(json!(user.to_serialized())))
}

pub fn router() -> Router<ServerContext> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}
