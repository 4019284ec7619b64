//! The JSON-RPC 2.0 façade over the tool dispatcher, served at `POST /v1/mcp`.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use clack_collab::{CallerIdentity, ToolError};
use clack_core::{PROTOCOL_VERSION, SERVER_NAME};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{auth::Session, ServerContext};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Parse error")]
    Parse,
    #[error("Invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("{0}")]
    InvalidParams(String),
    #[error("Internal error")]
    Internal,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
}

impl RpcError {
    pub fn code(&self) -> i64 {
        match self {
            Self::Parse => -32700,
            Self::InvalidRequest(_) => -32600,
            Self::MethodNotFound(_) => -32601,
            Self::InvalidParams(_) => -32602,
            Self::Internal => -32603,
            Self::NotFound(_) => -32004,
            Self::Conflict(_) => -32009,
        }
    }

    /// Envelope errors are answered with a 400, everything else rides on a 200.
    fn status(&self) -> StatusCode {
        match self {
            Self::Parse | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::OK,
        }
    }
}

impl From<ToolError> for RpcError {
    fn from(error: ToolError) -> Self {
        match error {
            ToolError::UnknownTool(name) => Self::MethodNotFound(name),
            e @ (ToolError::InvalidParams(_) | ToolError::Unauthorized(_)) => {
                Self::InvalidParams(e.to_string())
            }
            ToolError::NotFound(message) => Self::NotFound(message),
            ToolError::Conflict(message) => Self::Conflict(message),
            ToolError::Internal(_) => Self::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, error: &RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(ErrorObject {
                code: error.code(),
                message: error.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// A handled request: the response to send, if any, and its HTTP status.
pub struct RpcReply {
    pub status: StatusCode,
    pub response: Option<RpcResponse>,
}

impl IntoResponse for RpcReply {
    fn into_response(self) -> Response {
        match self.response {
            Some(response) => (self.status, Json(response)).into_response(),
            None => StatusCode::ACCEPTED.into_response(),
        }
    }
}

/// Handles one raw request body for an authenticated caller.
pub async fn handle(context: &ServerContext, caller: &CallerIdentity, body: &[u8]) -> RpcReply {
    let envelope: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => return reject(Some(Value::Null), RpcError::Parse),
    };

    // The id is echoed as given, so it's picked out before the envelope is checked.
    let id = envelope.get("id").cloned();

    if !envelope.is_object() {
        return reject(id, RpcError::InvalidRequest("expected an object"));
    }

    let request: RpcRequest = match serde_json::from_value(envelope) {
        Ok(request) => request,
        Err(_) => return reject(id, RpcError::InvalidRequest("missing jsonrpc or method")),
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return reject(id, RpcError::InvalidRequest("jsonrpc must be \"2.0\""));
    }

    debug!("{} requested {}", caller.username, request.method);

    if request.method.starts_with("notifications/") {
        return RpcReply {
            status: StatusCode::OK,
            response: id.map(|id| RpcResponse::success(Some(id), json!({ "acknowledged": true }))),
        };
    }

    let outcome = match request.method.as_str() {
        "initialize" => Ok(initialize_result()),
        "tools/list" => Ok(json!({ "tools": context.collab.tools.registry().list() })),
        "prompts/list" => Ok(json!({ "prompts": [] })),
        "resources/list" => Ok(json!({ "resources": [] })),
        "tools/call" => call_tool(context, caller, request.params).await,
        other => Err(RpcError::MethodNotFound(other.to_string())),
    };

    match outcome {
        Ok(result) => RpcReply {
            status: StatusCode::OK,
            response: Some(RpcResponse::success(id, result)),
        },
        Err(e) => reject(id, e),
    }
}

fn reject(id: Option<Value>, error: RpcError) -> RpcReply {
    RpcReply {
        status: error.status(),
        response: Some(RpcResponse::failure(id, &error)),
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
        "capabilities": {
            "tools": {},
            "resources": {},
            "prompts": {},
        },
    })
}

async fn call_tool(
    context: &ServerContext,
    caller: &CallerIdentity,
    params: Value,
) -> Result<Value, RpcError> {
    let params: CallParams = serde_json::from_value(params)
        .map_err(|_| RpcError::InvalidParams("Invalid params: expected name and arguments".into()))?;

    let collab = context.collab.clone();
    let caller = caller.clone();
    let name = params.name;

    // A panicking handler must still produce a response.
    let task = tokio::spawn(async move {
        collab
            .tools
            .execute(&name, params.arguments, &caller)
            .await
            .map(|result| (name, result))
    });

    match task.await {
        Ok(Ok((name, result))) => {
            info!("Tool {name} succeeded");
            serde_json::to_value(result).map_err(|_| RpcError::Internal)
        }
        Ok(Err(e)) => Err(e.into()),
        Err(e) => {
            error!("Tool call task failed: {e}");
            Err(RpcError::Internal)
        }
    }
}

async fn mcp(State(context): State<ServerContext>, session: Session, body: Bytes) -> RpcReply {
    handle(&context, session.identity(), &body).await
}

pub fn router() -> Router<ServerContext> {
    Router::new().route("/mcp", post(mcp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_errors_map_to_stable_codes() {
        let cases = [
            (ToolError::UnknownTool("x".into()), -32601),
            (ToolError::InvalidParams("bad".into()), -32602),
            (ToolError::Unauthorized("no".into()), -32602),
            (ToolError::NotFound("gone".into()), -32004),
            (ToolError::Conflict("dup".into()), -32009),
            (ToolError::Internal("secret".into()), -32603),
        ];

        for (error, code) in cases {
            assert_eq!(RpcError::from(error).code(), code);
        }
    }

    #[test]
    fn test_internal_detail_is_not_exposed() {
        let error = RpcError::from(ToolError::Internal("disk on fire".into()));
        assert_eq!(error.to_string(), "Internal error");
    }

    #[test]
    fn test_unauthorized_keeps_its_prefix() {
        let error = RpcError::from(ToolError::Unauthorized("You can only access your own messages".into()));
        assert!(error.to_string().starts_with("Unauthorized:"));
    }

    #[test]
    fn test_absent_id_is_skipped() {
        let response = RpcResponse::success(None, json!({}));
        let value = serde_json::to_value(response).unwrap();

        assert!(value.get("id").is_none());
        assert_eq!(value["jsonrpc"], "2.0");
    }
}
