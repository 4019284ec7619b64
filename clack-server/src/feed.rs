use std::sync::Arc;

use clack_collab::{encode, ChatEvent, EventSink};
use log::debug;

use crate::connections::ConnectionRegistry;

/// Pushes committed mutations to the connections that should see them.
///
/// Delivery never blocks and never fails the mutation that caused it.
pub struct ChangeFeed {
    connections: Arc<ConnectionRegistry>,
}

impl ChangeFeed {
    pub fn new(connections: &Arc<ConnectionRegistry>) -> Self {
        Self {
            connections: connections.clone(),
        }
    }
}

impl EventSink for ChangeFeed {
    fn emit(&self, event: ChatEvent) {
        let message = encode(&event);
        let reached = self.connections.deliver(&message);

        debug!(
            "Delivered {} patch(es) to {reached} connection(s)",
            message.patches.len()
        );
    }
}
