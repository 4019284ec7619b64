use clack_collab::{CallerIdentity, FeedMessage, PrimaryKey};
use clack_core::Id;
use dashmap::DashMap;
use futures_util::Stream;
use log::{debug, info};
use serde_json::json;
use std::{
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll},
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub type ConnectionId = Id<Connection>;

/// Tracks the live change-feed connections and which user each belongs to.
///
/// Handlers insert, the feed iterates, and dropped streams remove, all concurrently.
pub struct ConnectionRegistry {
    me: Weak<Self>,
    connections: DashMap<ConnectionId, Connection>,
}

pub struct Connection {
    user_id: PrimaryKey,
    sender: UnboundedSender<String>,
}

/// The receiving end of a connection. Dropping it disconnects.
pub struct ConnectionHandle {
    id: ConnectionId,
    receiver: UnboundedReceiver<String>,
    /// Required to remove connection when dropped
    manager: Weak<ConnectionRegistry>,
}

impl ConnectionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections: Default::default(),
        })
    }

    /// Registers a connection for a user. The first payload is the hello message.
    pub fn connect(&self, identity: &CallerIdentity) -> ConnectionHandle {
        let id = ConnectionId::new();
        let (sender, receiver) = unbounded_channel();

        let hello = json!({
            "type": "connected",
            "user": {
                "userId": identity.user_id,
                "username": identity.username,
            },
        });

        if let Err(e) = sender.send(hello.to_string()) {
            debug!("Couldn't queue the hello for {}: {e}", identity.username);
        }

        self.connections.insert(
            id,
            Connection {
                user_id: identity.user_id,
                sender,
            },
        );

        info!("{} connected to the change feed ({id})", identity.username);

        ConnectionHandle {
            id,
            receiver,
            manager: self.me.clone(),
        }
    }

    pub fn disconnect(&self, id: ConnectionId) {
        if self.connections.remove(&id).is_some() {
            debug!("Connection {id} closed");
        }
    }

    /// Sends a payload to every connection whose user passes the filter.
    /// Returns how many connections it reached. Dead connections are pruned.
    pub fn broadcast(&self, filter: impl Fn(PrimaryKey) -> bool, payload: &str) -> usize {
        let mut dead = vec![];
        let mut reached = 0;

        for entry in self.connections.iter() {
            if !filter(entry.user_id) {
                continue;
            }

            match entry.sender.send(payload.to_string()) {
                Ok(()) => reached += 1,
                Err(_) => dead.push(*entry.key()),
            }
        }

        for id in dead {
            info!("Pruning dead connection {id}");
            self.connections.remove(&id);
        }

        reached
    }

    pub fn deliver(&self, message: &FeedMessage) -> usize {
        self.broadcast(
            |user_id| message.audience.includes(user_id),
            &message.payload(),
        )
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// How many live connections a user has
    pub fn connections_of(&self, user_id: PrimaryKey) -> usize {
        self.connections
            .iter()
            .filter(|c| c.user_id == user_id)
            .count()
    }
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Stream for ConnectionHandle {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{FutureExt, StreamExt};

    use super::*;

    fn identity(user_id: PrimaryKey) -> CallerIdentity {
        CallerIdentity {
            user_id,
            username: format!("user{user_id}"),
            superuser: false,
        }
    }

    fn next(handle: &mut ConnectionHandle) -> Option<String> {
        handle.next().now_or_never().flatten()
    }

    #[test]
    fn test_hello_comes_first() {
        let registry = ConnectionRegistry::new();
        let mut handle = registry.connect(&identity(1));

        let hello: serde_json::Value = serde_json::from_str(&next(&mut handle).unwrap()).unwrap();

        assert_eq!(hello["type"], "connected");
        assert_eq!(hello["user"]["userId"], 1);
        assert!(next(&mut handle).is_none());
    }

    #[test]
    fn test_targeted_broadcast() {
        let registry = ConnectionRegistry::new();
        let mut alice = registry.connect(&identity(1));
        let mut carol = registry.connect(&identity(3));
        next(&mut alice);
        next(&mut carol);

        let reached = registry.broadcast(|user_id| user_id == 1, "secret");

        assert_eq!(reached, 1);
        assert_eq!(next(&mut alice).as_deref(), Some("secret"));
        assert!(next(&mut carol).is_none());
    }

    #[test]
    fn test_payloads_keep_their_order() {
        let registry = ConnectionRegistry::new();
        let mut handle = registry.connect(&identity(1));
        next(&mut handle);

        for payload in ["one", "two", "three"] {
            registry.broadcast(|_| true, payload);
        }

        let received: Vec<_> = std::iter::from_fn(|| next(&mut handle)).collect();
        assert_eq!(received, ["one", "two", "three"]);
    }

    #[test]
    fn test_dropping_the_handle_disconnects() {
        let registry = ConnectionRegistry::new();
        let handle = registry.connect(&identity(1));
        let _other = registry.connect(&identity(2));

        assert_eq!(registry.len(), 2);
        drop(handle);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.connections_of(1), 0);
        assert_eq!(registry.broadcast(|_| true, "still works"), 1);
    }
}
