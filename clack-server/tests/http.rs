use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use clack_collab::MemoryDatabase;
use clack_server::{router, ServerConfig, ServerContext};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let context = ServerContext::new(Arc::new(MemoryDatabase::new()), &ServerConfig::default());
    router(context)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, body)
}

fn post_json(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
}

async fn register(app: &Router, username: &str) -> String {
    let body = json!({ "username": username, "password": "hunter22" });
    let request = post_json("/v1/auth/register")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], username);

    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_healthy() {
    let app = app();
    let request = Request::builder().uri("/__health").body(Body::empty()).unwrap();

    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn short_passwords_are_refused() {
    let app = app();
    let body = json!({ "username": "alice", "password": "123" });
    let request = post_json("/v1/auth/register")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mcp_requires_a_session() {
    let app = app();
    let body = json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" });
    let request = post_json("/v1/mcp")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bearer_and_header_credentials_both_work() {
    let app = app();
    let token = register(&app, "alice").await;

    let me = Request::builder()
        .uri("/v1/auth/me")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, me).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    let call = json!({
        "jsonrpc": "2.0",
        "id": "x1",
        "method": "tools/call",
        "params": { "name": "create_room", "arguments": { "name": "general" } },
    });
    let request = post_json("/v1/mcp")
        .header("x-username", "alice")
        .header("x-password", "hunter22")
        .body(Body::from(call.to_string()))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "x1");
    assert_eq!(body["result"]["isError"], false);
}

#[tokio::test]
async fn malformed_bodies_get_a_bad_request() {
    let app = app();
    let token = register(&app, "alice").await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/mcp")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from("{oops"))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn notifications_are_accepted_without_a_body() {
    let app = app();
    let token = register(&app, "alice").await;
    let body = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });

    let request = post_json("/v1/mcp")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}
