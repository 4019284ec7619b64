use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// One item of a tool result's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

/// What a tool handler returns before it's wrapped for the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Plain text, sent as-is
    Text(String),
    /// A structured payload, sent as JSON text
    Json(Value),
    /// Already in the wrapped shape
    Wrapped(ToolResult),
}

/// The uniform shape every tool call result takes on the wire.
///
/// The structured payload is kept alongside the text content so callers inside
/// the process never have to re-parse the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<Content>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(skip)]
    payload: Option<Value>,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
            payload: None,
        }
    }

    /// Wraps a structured payload. A payload with `"isError": true` marks the result as failed.
    pub fn json(payload: Value) -> Self {
        let is_error = payload
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Self {
            content: vec![Content::Text {
                text: payload.to_string(),
            }],
            is_error,
            payload: Some(payload),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    /// The structured payload, if this result was built from one in this process.
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// The text of the first content item.
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|c| match c {
            Content::Text { text } => text.as_str(),
        })
    }

    /// Decodes the payload, parsing the first text item if the result came off the wire.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        match &self.payload {
            Some(payload) => T::deserialize(payload),
            None => serde_json::from_str(self.first_text().unwrap_or("null")),
        }
    }
}

impl From<ToolOutput> for ToolResult {
    fn from(output: ToolOutput) -> Self {
        match output {
            ToolOutput::Text(text) => ToolResult::text(text),
            ToolOutput::Json(payload) => ToolResult::json(payload),
            ToolOutput::Wrapped(result) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_strings_become_a_single_text_item() {
        let result = ToolResult::from(ToolOutput::Text("done".to_string()));

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "content": [{ "type": "text", "text": "done" }], "isError": false })
        );
    }

    #[test]
    fn test_json_is_serialized_as_text() {
        let result = ToolResult::from(ToolOutput::Json(json!({ "success": true, "room": { "id": 10 } })));

        let text = result.first_text().unwrap();
        let reparsed: Value = serde_json::from_str(text).unwrap();

        assert_eq!(reparsed["room"]["id"], 10);
        assert!(!result.is_error);
    }

    #[test]
    fn test_is_error_flag_is_lifted_from_the_payload() {
        let result = ToolResult::from(ToolOutput::Json(json!({ "isError": true, "message": "nope" })));

        assert!(result.is_error);
    }

    #[test]
    fn test_wrapped_results_pass_through() {
        let wrapped = ToolResult::error("already wrapped");
        let result = ToolResult::from(ToolOutput::Wrapped(wrapped.clone()));

        assert_eq!(result, wrapped);
    }

    #[test]
    fn test_decode_uses_payload_or_text() {
        #[derive(Deserialize)]
        struct Body {
            success: bool,
        }

        let local = ToolResult::json(json!({ "success": true }));
        assert!(local.decode::<Body>().unwrap().success);

        let wire: ToolResult = serde_json::from_value(json!({
            "content": [{ "type": "text", "text": "{\"success\":true}" }],
            "isError": false
        }))
        .unwrap();
        assert!(wire.payload().is_none());
        assert!(wire.decode::<Body>().unwrap().success);
    }
}
