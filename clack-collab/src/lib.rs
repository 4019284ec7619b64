mod auth;
mod db;
mod events;
mod feed;
mod serialized;
mod tools;

use std::sync::Arc;

pub use auth::*;
pub use db::*;
pub use events::*;
pub use feed::*;
pub use serialized::*;
pub use tools::*;

/// A store chosen at runtime
pub type SharedStore = Arc<dyn ChatStore>;

/// The clack collab system, facilitating authentication, room management, and tool calls.
pub struct Collab<Db: ?Sized> {
    pub database: Arc<Db>,
    pub auth: Auth<Db>,
    pub tools: ToolDispatcher<Db>,
}

/// A type passed to various components of the collab system, to access state and emit events.
pub struct CollabContext<Db: ?Sized> {
    pub database: Arc<Db>,
    events: Arc<dyn EventSink>,
}

#[derive(Debug, Clone)]
pub struct CollabConfig {
    /// How long a login session stays valid
    pub session_days: i64,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            session_days: DEFAULT_SESSION_DAYS,
        }
    }
}

impl<Db> Collab<Db>
where
    Db: ChatStore + ?Sized,
{
    /// Creates the collab system. Every committed mutation is reported to `events`.
    pub fn new(database: Arc<Db>, events: Arc<dyn EventSink>, config: CollabConfig) -> Self {
        let context = CollabContext::new(database.clone(), events);

        Self {
            auth: Auth::new(&context, config.session_days),
            tools: ToolDispatcher::new(&context),
            database,
        }
    }
}

impl<Db: ?Sized> CollabContext<Db> {
    pub fn new(database: Arc<Db>, events: Arc<dyn EventSink>) -> Self {
        Self { database, events }
    }

    pub fn emit(&self, event: ChatEvent) {
        self.events.emit(event)
    }
}

impl<Db: ?Sized> Clone for CollabContext<Db> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            events: self.events.clone(),
        }
    }
}
