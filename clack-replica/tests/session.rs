use std::sync::Arc;

use async_trait::async_trait;
use clack_collab::{
    CallerIdentity, ChatStore, Collab, CollabConfig, IndexRange, MemoryDatabase, NewPlainUser,
    ToolError,
};
use clack_core::{wire::User, ConversationKey, ToolResult};
use clack_replica::{snapshot, ClientError, ReplicaSession, ToolClient, PAGE_SIZE};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Serves `total` users through the index range tool and records every window asked for.
struct PagedUsers {
    total: usize,
    windows: Mutex<Vec<(usize, usize)>>,
}

#[async_trait]
impl ToolClient for PagedUsers {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, ClientError> {
        assert_eq!(name, "get_users_by_index_range");

        let start = arguments["startIndex"].as_u64().unwrap() as usize;
        let end = arguments["endIndex"].as_u64().unwrap() as usize;
        self.windows.lock().push((start, end));

        let users: Vec<_> = (start..end.min(self.total))
            .map(|i| json!({ "id": i + 1, "username": format!("user{i}"), "createdAt": "2024-01-01T00:00:00Z" }))
            .collect();

        Ok(ToolResult::json(json!(users)))
    }
}

#[tokio::test]
async fn snapshots_stop_at_the_first_short_page() {
    let client = PagedUsers {
        total: 250,
        windows: Mutex::new(vec![]),
    };

    let users: Vec<User> = snapshot::all_users(&client).await.unwrap();

    assert_eq!(users.len(), 250);
    assert_eq!(*client.windows.lock(), [(0, 100), (100, 200), (200, 300)]);
}

#[tokio::test]
async fn an_exact_multiple_needs_one_empty_page() {
    let client = PagedUsers {
        total: 200,
        windows: Mutex::new(vec![]),
    };

    let users: Vec<User> = snapshot::all_users(&client).await.unwrap();

    assert_eq!(users.len(), 200);
    assert_eq!(client.windows.lock().len(), 3);
}

/// Runs tools directly against an in-process collab system.
struct InProcess {
    collab: Arc<Collab<MemoryDatabase>>,
    caller: CallerIdentity,
}

#[async_trait]
impl ToolClient for InProcess {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, ClientError> {
        self.collab
            .tools
            .execute(name, arguments, &self.caller)
            .await
            .map_err(|e: ToolError| ClientError::Rpc {
                code: 0,
                message: e.to_string(),
            })
    }
}

async fn world() -> (Arc<Collab<MemoryDatabase>>, CallerIdentity, CallerIdentity) {
    let (sender, _receiver) = crossbeam::channel::unbounded();
    let collab = Arc::new(Collab::new(
        Arc::new(MemoryDatabase::new()),
        Arc::new(sender),
        CollabConfig::default(),
    ));

    let mut identities = vec![];

    for username in ["alice", "bob"] {
        let user = collab
            .auth
            .register_basic(NewPlainUser {
                username: username.into(),
                password: "password".into(),
            })
            .await
            .unwrap();

        identities.push(CallerIdentity::from(&user));
    }

    let bob = identities.pop().unwrap();
    let alice = identities.pop().unwrap();

    (collab, alice, bob)
}

fn session_for(collab: &Arc<Collab<MemoryDatabase>>, caller: &CallerIdentity) -> ReplicaSession<InProcess> {
    let client = InProcess {
        collab: collab.clone(),
        caller: caller.clone(),
    };

    ReplicaSession::new(Arc::new(client), caller.user_id)
}

#[tokio::test]
async fn sync_builds_the_tree() {
    let (collab, alice, bob) = world().await;
    let session = session_for(&collab, &alice);

    session.send_direct_message(bob.user_id, "hello").await.unwrap();
    let events = session.sync().await.unwrap();

    assert!(!events.is_empty());

    let replica = session.replica().lock();
    assert_eq!(replica.user_id_by_name("bob"), Some(bob.user_id));
    assert_eq!(replica.tree().users[&bob.user_id].messages.len(), 1);

    let key = ConversationKey::new(alice.user_id, bob.user_id).unwrap();
    assert_eq!(replica.conversation(key).unwrap().len(), 1);
}

#[tokio::test]
async fn sent_messages_replace_their_staged_copy() {
    let (collab, alice, bob) = world().await;
    let session = session_for(&collab, &alice);
    session.sync().await.unwrap();

    let sent = session.send_direct_message(bob.user_id, "hi bob").await.unwrap();

    let replica = session.replica().lock();
    let key = ConversationKey::new(alice.user_id, bob.user_id).unwrap();
    let timeline = replica.conversation(key).unwrap();

    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline.messages()[0].id, sent.id);
    assert!(sent.id > 0);
}

#[tokio::test]
async fn repeated_quick_sends_all_show() {
    let (collab, alice, bob) = world().await;
    let session = session_for(&collab, &alice);
    session.sync().await.unwrap();

    let first = session.send_direct_message(bob.user_id, "ok").await.unwrap();
    let second = session.send_direct_message(bob.user_id, "ok").await.unwrap();

    let key = ConversationKey::new(alice.user_id, bob.user_id).unwrap();
    let stored = collab
        .database
        .conversation_messages(key, IndexRange::new(0, 10))
        .await
        .unwrap();

    let replica = session.replica().lock();
    let ids: Vec<_> = replica
        .conversation(key)
        .unwrap()
        .messages()
        .iter()
        .map(|m| m.id)
        .collect();

    assert_eq!(stored.len(), 2);
    assert_eq!(ids, [first.id, second.id]);
}

#[tokio::test]
async fn refused_messages_are_taken_back() {
    let (collab, alice, _bob) = world().await;
    let session = session_for(&collab, &alice);
    session.sync().await.unwrap();

    let result = session.send_room_message(999, "anyone?").await;

    assert!(result.is_err());
    assert!(session.replica().lock().room_timeline(999).unwrap().is_empty());
}

#[tokio::test]
async fn scrolling_back_prepends_until_exhausted() {
    let (collab, alice, bob) = world().await;
    let sender = session_for(&collab, &bob);

    for i in 0..23 {
        sender
            .send_direct_message(alice.user_id, &format!("message {i}"))
            .await
            .unwrap();
    }

    let session = session_for(&collab, &alice);
    let mut loaded = vec![];

    loop {
        let count = session.load_older_direct(bob.user_id).await.unwrap();

        if count == 0 {
            break;
        }

        loaded.push(count);
    }

    assert_eq!(loaded, [PAGE_SIZE, PAGE_SIZE, 3]);

    let replica = session.replica().lock();
    let key = ConversationKey::new(alice.user_id, bob.user_id).unwrap();
    let timeline = replica.conversation(key).unwrap();

    assert!(!timeline.has_more());
    assert_eq!(timeline.messages()[0].content, "message 0");
    assert_eq!(timeline.messages()[22].content, "message 22");
}
