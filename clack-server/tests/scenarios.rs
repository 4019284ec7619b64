use std::sync::Arc;

use clack_collab::{CallerIdentity, MemoryDatabase, NewPlainUser};
use clack_server::{handle_rpc, ConnectionHandle, RpcResponse, ServerConfig, ServerContext};
use futures_util::{FutureExt, StreamExt};
use serde_json::{json, Value};

struct Scenario {
    context: ServerContext,
    next_request: i64,
}

struct Client {
    identity: CallerIdentity,
    feed: ConnectionHandle,
}

impl Client {
    /// Everything pushed to this client since the last call.
    fn received(&mut self) -> Vec<Value> {
        std::iter::from_fn(|| self.feed.next().now_or_never().flatten())
            .map(|payload| serde_json::from_str(&payload).unwrap())
            .collect()
    }
}

impl Scenario {
    fn new() -> Self {
        let context = ServerContext::new(Arc::new(MemoryDatabase::new()), &ServerConfig::default());

        Self {
            context,
            next_request: 0,
        }
    }

    async fn connect(&self, username: &str) -> Client {
        let user = self
            .context
            .collab
            .auth
            .register_basic(NewPlainUser {
                username: username.into(),
                password: "password".into(),
            })
            .await
            .unwrap();

        let identity = CallerIdentity::from(&user);
        let mut feed = self.context.connections.connect(&identity);

        let hello: Value = serde_json::from_str(&feed.next().await.unwrap()).unwrap();
        assert_eq!(hello["type"], "connected");

        Client { identity, feed }
    }

    async fn rpc(&mut self, caller: &Client, body: Value) -> RpcResponse {
        let reply = handle_rpc(&self.context, &caller.identity, body.to_string().as_bytes()).await;
        reply.response.unwrap()
    }

    async fn call(&mut self, caller: &Client, name: &str, arguments: Value) -> RpcResponse {
        self.next_request += 1;
        let id = self.next_request;

        self.rpc(
            caller,
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": "tools/call",
                "params": { "name": name, "arguments": arguments },
            }),
        )
        .await
    }

    /// Calls a tool and decodes the text payload of its result.
    async fn call_ok(&mut self, caller: &Client, name: &str, arguments: Value) -> Value {
        let response = self.call(caller, name, arguments).await;
        let result = response.result.unwrap_or_else(|| panic!("{name} failed: {:?}", response.error));

        assert_eq!(result["isError"], false);
        serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap()
    }
}

fn paths(patches: &[Value]) -> Vec<String> {
    patches
        .iter()
        .flat_map(|p| match p {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        })
        .map(|p| format!("{} {}", p["op"].as_str().unwrap(), p["path"].as_str().unwrap()))
        .collect()
}

#[tokio::test]
async fn new_users_are_announced_to_everyone() {
    let scenario = Scenario::new();
    let mut alice = scenario.connect("alice").await;
    let bob = scenario.connect("bob").await;

    let received = alice.received();

    assert_eq!(paths(&received), ["add /users"]);
    assert_eq!(received[0]["value"]["id"], bob.identity.user_id);
    assert_eq!(received[0]["value"]["username"], "bob");
}

#[tokio::test]
async fn creating_and_joining_a_room_reaches_both_users() {
    let mut scenario = Scenario::new();
    let mut alice = scenario.connect("alice").await;
    let mut bob = scenario.connect("bob").await;
    alice.received();

    let created = scenario.call_ok(&alice, "create_room", json!({ "name": "general" })).await;
    let room_id = created["id"].as_i64().unwrap();

    assert_eq!(created["ownerId"], alice.identity.user_id);
    assert_eq!(created["memberCount"], 1);

    for client in [&mut alice, &mut bob] {
        let received = client.received();
        assert_eq!(paths(&received), ["add /rooms"]);
        assert_eq!(received[0]["value"]["name"], "general");
    }

    let joined = scenario.call_ok(&bob, "join_room", json!({ "roomId": room_id })).await;
    assert_eq!(joined["room"]["memberCount"], 2);

    let bob_user_id = bob.identity.user_id.clone();
    for client in [&mut alice, &mut bob] {
        let received = client.received();
        assert_eq!(paths(&received), [format!("replace /rooms/{room_id}")]);
        assert_eq!(received[0]["joinedUserId"], bob_user_id);
        assert_eq!(received[0]["value"]["memberCount"], 2);
    }
}

#[tokio::test]
async fn direct_messages_reach_only_the_participants() {
    let mut scenario = Scenario::new();
    let mut alice = scenario.connect("alice").await;
    let mut bob = scenario.connect("bob").await;
    let mut carol = scenario.connect("carol").await;
    alice.received();
    bob.received();

    let sent = scenario
        .call_ok(
            &alice,
            "send_message",
            json!({ "otherUserId": bob.identity.user_id, "content": "hello" }),
        )
        .await;

    let message = &sent;
    assert_eq!(message["userA"], alice.identity.user_id);
    assert_eq!(message["userB"], bob.identity.user_id);
    assert_eq!(message["senderId"], alice.identity.user_id);

    let message_id = message["id"].as_i64().unwrap();
    let expected = [
        format!("add /users/{}/messages/{message_id}", alice.identity.user_id),
        format!("add /users/{}/messages/{message_id}", bob.identity.user_id),
    ];

    assert_eq!(paths(&alice.received()), expected);
    assert_eq!(paths(&bob.received()), expected);
    assert!(carol.received().is_empty());
}

#[tokio::test]
async fn room_messages_reach_only_members() {
    let mut scenario = Scenario::new();
    let mut alice = scenario.connect("alice").await;
    let mut bob = scenario.connect("bob").await;
    let mut carol = scenario.connect("carol").await;

    let created = scenario.call_ok(&alice, "create_room", json!({ "name": "general" })).await;
    let room_id = created["id"].as_i64().unwrap();
    scenario.call_ok(&bob, "join_room", json!({ "roomId": room_id })).await;

    alice.received();
    bob.received();
    carol.received();

    scenario
        .call_ok(
            &bob,
            "send_room_message",
            json!({ "roomId": room_id, "content": "hi all", "clientMessageId": "tmp-1" }),
        )
        .await;

    let received = alice.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["value"]["clientMessageId"], "tmp-1");
    assert_eq!(bob.received().len(), 1);
    assert!(carol.received().is_empty());
}

#[tokio::test]
async fn deleting_a_room_removes_it_everywhere() {
    let mut scenario = Scenario::new();
    let mut alice = scenario.connect("alice").await;
    let mut bob = scenario.connect("bob").await;

    let created = scenario.call_ok(&alice, "create_room", json!({ "name": "general" })).await;
    let room_id = created["id"].as_i64().unwrap();
    scenario.call_ok(&bob, "join_room", json!({ "roomId": room_id })).await;
    scenario
        .call_ok(&bob, "send_room_message", json!({ "roomId": room_id, "content": "bye" }))
        .await;

    alice.received();
    bob.received();

    // Bob is a member but not the owner
    let refused = scenario
        .call(&bob, "delete_room", json!({ "roomId": room_id, "ownerId": bob.identity.user_id }))
        .await;
    assert_eq!(refused.error.unwrap().code, -32602);

    let deleted = scenario
        .call_ok(&alice, "delete_room", json!({ "roomId": room_id, "ownerId": alice.identity.user_id }))
        .await;
    assert_eq!(deleted["success"], true);

    assert_eq!(paths(&bob.received()), [format!("remove /rooms/{room_id}")]);

    let rooms = scenario
        .call_ok(&bob, "get_user_rooms", json!({ "userId": bob.identity.user_id }))
        .await;
    assert_eq!(rooms, json!([]));

    let messages = scenario
        .call(
            &alice,
            "get_room_messages_by_index_range",
            json!({ "roomId": room_id, "startIndex": 0, "endIndex": 10 }),
        )
        .await;
    assert_eq!(messages.error.unwrap().code, -32004);
}

#[tokio::test]
async fn envelope_errors_and_notifications() {
    let mut scenario = Scenario::new();
    let alice = scenario.connect("alice").await;

    let reply = handle_rpc(&scenario.context, &alice.identity, b"{not json").await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.response.unwrap().error.unwrap().code, -32700);

    let wrong_version = scenario
        .rpc(&alice, json!({ "jsonrpc": "1.0", "id": "a", "method": "tools/list" }))
        .await;
    assert_eq!(wrong_version.id, Some(json!("a")));
    assert_eq!(wrong_version.error.unwrap().code, -32600);

    let unknown = scenario
        .rpc(&alice, json!({ "jsonrpc": "2.0", "id": 7, "method": "tools/destroy" }))
        .await;
    assert_eq!(unknown.error.unwrap().code, -32601);

    let silent = handle_rpc(
        &scenario.context,
        &alice.identity,
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })
            .to_string()
            .as_bytes(),
    )
    .await;
    assert!(silent.response.is_none());

    let acknowledged = scenario
        .rpc(&alice, json!({ "jsonrpc": "2.0", "id": 3, "method": "notifications/initialized" }))
        .await;
    assert_eq!(acknowledged.result, Some(json!({ "acknowledged": true })));
}

#[tokio::test]
async fn discovery_methods() {
    let mut scenario = Scenario::new();
    let alice = scenario.connect("alice").await;

    let initialized = scenario
        .rpc(&alice, json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }))
        .await
        .result
        .unwrap();

    assert_eq!(initialized["protocolVersion"], "2024-11-05");
    assert_eq!(initialized["serverInfo"]["name"], "clack-chat");
    assert!(initialized["capabilities"]["tools"].is_object());

    let tools = scenario
        .rpc(&alice, json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }))
        .await
        .result
        .unwrap();

    let names: Vec<_> = tools["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();

    assert!(names.contains(&"send_message".to_string()));
    assert!(names.contains(&"delete_user".to_string()));
    assert_eq!(tools["tools"][0]["inputSchema"]["type"], "object");

    let prompts = scenario
        .rpc(&alice, json!({ "jsonrpc": "2.0", "id": 3, "method": "prompts/list" }))
        .await;
    assert_eq!(prompts.result, Some(json!({ "prompts": [] })));
}

#[tokio::test]
async fn validation_errors_name_the_field() {
    let mut scenario = Scenario::new();
    let alice = scenario.connect("alice").await;
    let bob = scenario.connect("bob").await;

    let response = scenario
        .call(&alice, "send_message", json!({ "otherUserId": bob.identity.user_id }))
        .await;

    let error = response.error.unwrap();
    assert_eq!(error.code, -32602);
    assert!(error.message.starts_with("Invalid params:"));
    assert!(error.message.contains("content"));
}
