//! A client-side replica of the chat state: a normalized tree and ordered message
//! timelines, seeded from paginated snapshots and kept current by the change feed.

mod client;
mod feed;
mod replica;
mod session;
pub mod snapshot;
mod timeline;
mod tree;

pub use client::*;
pub use feed::*;
pub use replica::*;
pub use session::*;
pub use timeline::*;
pub use tree::*;
