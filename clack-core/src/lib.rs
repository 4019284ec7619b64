//! Protocol building blocks shared by the clack server and its clients: tool
//! schemas and argument validation, the tool result envelope, and the
//! change-feed patch format.

mod conversation;
mod patch;
mod result;
mod schema;
mod util;
mod validation;
pub mod wire;

pub use conversation::*;
pub use patch::*;
pub use result::*;
pub use schema::*;
pub use util::*;
pub use validation::*;

/// The type used for entity ids on the wire and in storage.
pub type EntityId = i64;

/// The tool-call protocol revision spoken by the server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// The name the server reports during `initialize`.
pub const SERVER_NAME: &str = "clack-chat";
