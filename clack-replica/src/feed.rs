//! The live change feed: an SSE connection that is reopened whenever it drops.

use std::{sync::Arc, time::Duration};

use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::header;
use tokio::sync::mpsc::UnboundedSender;

use crate::{client::ClientError, HttpToolClient, ReplicaEvent, ReplicaSession};

/// How long to wait before reconnecting a dropped feed.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Splits an SSE byte stream into the data of each event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes a chunk and returns the payloads of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut completed = Vec::new();

        while let Some(index) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=index).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    completed.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }

            // Comments carry the keep-alives
            if line.starts_with(':') {
                continue;
            }

            if let Some(data) = line.strip_prefix("data:") {
                self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
        }

        completed
    }
}

/// Keeps a session's replica in step with the server's change feed.
pub struct FeedSubscriber {
    session: ReplicaSession<HttpToolClient>,
    client: Arc<HttpToolClient>,
    events: UnboundedSender<ReplicaEvent>,
    reconnect_delay: Duration,
}

impl FeedSubscriber {
    pub fn new(
        client: Arc<HttpToolClient>,
        session: ReplicaSession<HttpToolClient>,
        events: UnboundedSender<ReplicaEvent>,
    ) -> Self {
        Self {
            session,
            client,
            events,
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Listens until nobody is receiving events anymore, reconnecting after failures.
    ///
    /// Every reconnect is followed by a full sync, since patches sent while the
    /// connection was down are lost.
    pub async fn run(self) {
        let mut reconnecting = false;

        loop {
            match self.listen(reconnecting).await {
                Ok(()) => info!("Change feed closed"),
                Err(e) => warn!("Change feed failed: {e}"),
            }

            if self.events.is_closed() {
                break;
            }

            info!("Reconnecting in {}s", self.reconnect_delay.as_secs_f32());
            tokio::time::sleep(self.reconnect_delay).await;

            reconnecting = true;
        }
    }

    async fn listen(&self, resync: bool) -> Result<(), ClientError> {
        let response = self
            .client
            .http()
            .get(format!("{}/v1/events", self.client.base_url()))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.client.token()))
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }

        if resync {
            match self.session.sync().await {
                Ok(events) => {
                    forward(&self.events, events);
                }
                Err(e) => warn!("Resync after reconnect failed: {e}"),
            }
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = stream.next().await {
            for payload in decoder.push(&chunk?) {
                let applied = self.session.replica().lock().apply_payload(&payload);

                match applied {
                    Ok(events) => {
                        forward(&self.events, events);
                    }
                    Err(e) => debug!("Skipping feed payload: {e}"),
                }
            }

            if self.events.is_closed() {
                return Ok(());
            }
        }

        Ok(())
    }
}

/// Hands events to the subscriber's receiver and returns how many got through.
fn forward(sender: &UnboundedSender<ReplicaEvent>, events: Vec<ReplicaEvent>) -> usize {
    let mut delivered = 0;

    for event in events {
        if sender.send(event).is_err() {
            debug!("Replica event receiver is gone, dropping events");
            break;
        }

        delivered += 1;
    }

    delivered
}
