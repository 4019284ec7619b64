use clack_core::{validate, ToolRegistry, ToolResult};
use log::{debug, error};
use serde_json::Value;

use super::{chat_tools, ToolError};
use crate::{CallerIdentity, ChatStore, CollabContext};

/// Resolves tool names to handlers and runs them for a verified caller.
pub struct ToolDispatcher<Db: ?Sized> {
    pub(super) context: CollabContext<Db>,
    registry: ToolRegistry,
}

impl<Db> ToolDispatcher<Db>
where
    Db: ChatStore + ?Sized,
{
    pub fn new(context: &CollabContext<Db>) -> Self {
        Self {
            context: context.clone(),
            registry: chat_tools(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Validates the arguments against the tool's schema, then runs the handler.
    /// Nothing touches the store unless validation passed.
    pub async fn execute(
        &self,
        name: &str,
        arguments: Value,
        caller: &CallerIdentity,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        validate(&tool.input_schema, &arguments)?;

        debug!("{} calls {name}", caller.username);

        match self.handle(name, arguments, caller).await {
            Ok(output) => Ok(output.into()),
            Err(ToolError::Internal(detail)) => {
                error!("Tool {name} failed: {detail}");
                Err(ToolError::Internal(detail))
            }
            Err(e) => {
                debug!("Tool {name} rejected for {}: {e}", caller.username);
                Err(e)
            }
        }
    }
}
