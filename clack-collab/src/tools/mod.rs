//! The chat tool surface: the catalog of named operations, the rules deciding who may
//! call them, and the dispatcher that runs them.

mod catalog;
mod dispatcher;
mod guard;
mod handlers;

pub use catalog::*;
pub use dispatcher::*;

use clack_core::ValidationErrors;
use log::error;
use thiserror::Error;

use crate::DatabaseError;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    /// Arguments failed the tool's input contract
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    /// The caller isn't entitled to the resource
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Something unexpected happened. The detail is for the logs only.
    #[error("Internal error")]
    Internal(String),
}

impl From<ValidationErrors> for ToolError {
    fn from(errors: ValidationErrors) -> Self {
        ToolError::InvalidParams(errors.to_string())
    }
}

impl From<DatabaseError> for ToolError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound { .. } => ToolError::NotFound(capitalize(&error.to_string())),
            DatabaseError::Conflict { .. } => ToolError::Conflict(capitalize(&error.to_string())),
            DatabaseError::Internal(e) => {
                error!("Database failure during tool call: {e}");
                ToolError::Internal(e.to_string())
            }
        }
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();

    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
