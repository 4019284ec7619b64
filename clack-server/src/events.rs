use std::{convert::Infallible, time::Duration};

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
    Router,
};
use futures_util::{Stream, StreamExt};

use crate::{auth::Session, ServerContext};

/// Streams change-feed payloads to the caller until they disconnect.
async fn event_stream(
    State(context): State<ServerContext>,
    session: Session,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let handle = context.connections.connect(session.identity());
    let stream = handle.map(|payload| Ok(Event::default().data(payload)));

    Sse::new(stream).keep_alive(keep_alive(context.keep_alive))
}

fn keep_alive(interval: Duration) -> KeepAlive {
    KeepAlive::new().interval(interval)
}

pub fn router() -> Router<ServerContext> {
    Router::new().route("/events", get(event_stream))
}
