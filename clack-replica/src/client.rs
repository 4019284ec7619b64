use async_trait::async_trait;
use clack_core::{Id, ToolResult};
use reqwest::{header, Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server responded with {0}")]
    Status(StatusCode),
    /// The server answered with a JSON-RPC error
    #[error("{message} ({code})")]
    Rpc { code: i64, message: String },
    #[error("Tool reported an error: {0}")]
    Tool(String),
    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Something that can run a named tool on behalf of the signed-in user.
#[async_trait]
pub trait ToolClient: Send + Sync {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, ClientError>;
}

/// Calls a tool and decodes the JSON payload of its result.
pub async fn call_json<T, C>(client: &C, name: &str, arguments: Value) -> Result<T, ClientError>
where
    T: DeserializeOwned,
    C: ToolClient + ?Sized,
{
    let result = client.call_tool(name, arguments).await?;

    if result.is_error {
        return Err(ClientError::Tool(
            result.first_text().unwrap_or_default().to_string(),
        ));
    }

    Ok(result.decode()?)
}

pub type RequestId = Id<HttpToolClient>;

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponseBody {
    #[serde(default)]
    result: Option<ToolResult>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Serialize)]
struct RpcRequestBody {
    jsonrpc: &'static str,
    id: RequestId,
    method: &'static str,
    params: Value,
}

/// Talks to a clack server over HTTP with a session token.
pub struct HttpToolClient {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpToolClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

#[async_trait]
impl ToolClient for HttpToolClient {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, ClientError> {
        let request = RpcRequestBody {
            jsonrpc: "2.0",
            id: RequestId::new(),
            method: "tools/call",
            params: json!({ "name": name, "arguments": arguments }),
        };

        let response = self
            .http
            .post(format!("{}/v1/mcp", self.base_url))
            .header(header::AUTHORIZATION, self.bearer())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body: RpcResponseBody = match response.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => return Err(ClientError::Status(status)),
            Err(e) => return Err(e.into()),
        };

        if let Some(error) = body.error {
            return Err(ClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        body.result.ok_or(ClientError::Status(status))
    }
}
