use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;
use clack_collab::{ChatStore, Collab, CollabConfig, SharedStore};

use crate::{config::ServerConfig, connections::ConnectionRegistry, feed::ChangeFeed};

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<Collab<dyn ChatStore>>,
    pub connections: Arc<ConnectionRegistry>,
    pub keep_alive: Duration,
}

impl ServerContext {
    /// Wires the collab system to a fresh connection registry.
    pub fn new(store: SharedStore, config: &ServerConfig) -> Self {
        let connections = ConnectionRegistry::new();
        let feed = Arc::new(ChangeFeed::new(&connections));

        let collab = Collab::new(
            store,
            feed,
            CollabConfig {
                session_days: config.session_days,
            },
        );

        Self {
            collab: Arc::new(collab),
            connections,
            keep_alive: config.keep_alive,
        }
    }
}
