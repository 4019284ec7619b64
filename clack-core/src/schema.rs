//! Declarative descriptions of tools and their argument contracts.
//!
//! A [ToolRegistry] is the single source of truth for which tools exist and
//! what arguments they accept. It is consumed both by the validator and by
//! capability discovery (`tools/list`), which serializes it verbatim.

use std::collections::HashMap;

use serde::{
    ser::{SerializeMap, SerializeStruct},
    Serialize, Serializer,
};

/// Extra constraints on the contents of a string field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    /// An RFC 3339 timestamp, e.g. `2024-05-01T12:00:00Z`
    DateTime,
}

impl StringFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StringFormat::DateTime => "date-time",
        }
    }
}

/// The type of a field along with the constraints that apply to that type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    /// A whole number, as used for ids and indexes
    Integer {
        minimum: Option<i64>,
        maximum: Option<i64>,
    },
    String {
        min_length: Option<usize>,
        max_length: Option<usize>,
        format: Option<StringFormat>,
    },
    Boolean,
}

impl FieldKind {
    /// The JSON-Schema name of this type.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Number { .. } => "number",
            FieldKind::Integer { .. } => "integer",
            FieldKind::String { .. } => "string",
            FieldKind::Boolean => "boolean",
        }
    }
}

/// Describes a single property of a tool's arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub description: String,
    pub kind: FieldKind,
}

impl FieldSchema {
    pub fn number(description: &str) -> Self {
        Self {
            description: description.to_string(),
            kind: FieldKind::Number {
                minimum: None,
                maximum: None,
            },
        }
    }

    pub fn integer(description: &str) -> Self {
        Self {
            description: description.to_string(),
            kind: FieldKind::Integer {
                minimum: None,
                maximum: None,
            },
        }
    }

    pub fn string(description: &str) -> Self {
        Self {
            description: description.to_string(),
            kind: FieldKind::String {
                min_length: None,
                max_length: None,
                format: None,
            },
        }
    }

    pub fn boolean(description: &str) -> Self {
        Self {
            description: description.to_string(),
            kind: FieldKind::Boolean,
        }
    }

    /// Sets the inclusive lower bound. Has no effect on non-numeric fields.
    ///
    /// Integer fields take the bound rounded up.
    pub fn minimum(mut self, value: f64) -> Self {
        match &mut self.kind {
            FieldKind::Number { minimum, .. } => *minimum = Some(value),
            FieldKind::Integer { minimum, .. } => *minimum = Some(value.ceil() as i64),
            _ => {}
        }
        self
    }

    /// Sets the inclusive upper bound. Has no effect on non-numeric fields.
    ///
    /// Integer fields take the bound rounded down.
    pub fn maximum(mut self, value: f64) -> Self {
        match &mut self.kind {
            FieldKind::Number { maximum, .. } => *maximum = Some(value),
            FieldKind::Integer { maximum, .. } => *maximum = Some(value.floor() as i64),
            _ => {}
        }
        self
    }

    /// Sets the minimum length in characters. Has no effect on non-string fields.
    pub fn min_length(mut self, value: usize) -> Self {
        if let FieldKind::String { min_length, .. } = &mut self.kind {
            *min_length = Some(value);
        }
        self
    }

    /// Sets the maximum length in characters. Has no effect on non-string fields.
    pub fn max_length(mut self, value: usize) -> Self {
        if let FieldKind::String { max_length, .. } = &mut self.kind {
            *max_length = Some(value);
        }
        self
    }

    pub fn format(mut self, value: StringFormat) -> Self {
        if let FieldKind::String { format, .. } = &mut self.kind {
            *format = Some(value);
        }
        self
    }
}

impl Serialize for FieldSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.kind.type_name())?;
        map.serialize_entry("description", &self.description)?;

        match &self.kind {
            FieldKind::Number { minimum, maximum } => {
                if let Some(minimum) = minimum {
                    map.serialize_entry("minimum", minimum)?;
                }
                if let Some(maximum) = maximum {
                    map.serialize_entry("maximum", maximum)?;
                }
            }
            FieldKind::Integer { minimum, maximum } => {
                if let Some(minimum) = minimum {
                    map.serialize_entry("minimum", minimum)?;
                }
                if let Some(maximum) = maximum {
                    map.serialize_entry("maximum", maximum)?;
                }
            }
            FieldKind::String {
                min_length,
                max_length,
                format,
            } => {
                if let Some(min_length) = min_length {
                    map.serialize_entry("minLength", min_length)?;
                }
                if let Some(max_length) = max_length {
                    map.serialize_entry("maxLength", max_length)?;
                }
                if let Some(format) = format {
                    map.serialize_entry("format", format.as_str())?;
                }
            }
            FieldKind::Boolean => {}
        }

        map.end()
    }
}

/// The argument contract of a tool. Always an object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    /// Properties in declaration order
    properties: Vec<(String, FieldSchema)>,
    required: Vec<String>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field that must be present.
    pub fn required(mut self, name: &str, field: FieldSchema) -> Self {
        self.required.push(name.to_string());
        self.optional(name, field)
    }

    /// Declares a field that may be omitted.
    pub fn optional(mut self, name: &str, field: FieldSchema) -> Self {
        self.properties.retain(|(n, _)| n != name);
        self.properties.push((name.to_string(), field));
        self
    }

    pub fn property(&self, name: &str) -> Option<&FieldSchema> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, field)| field)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &FieldSchema)> {
        self.properties.iter().map(|(n, f)| (n.as_str(), f))
    }

    pub fn required_fields(&self) -> &[String] {
        &self.required
    }
}

struct Properties<'a>(&'a [(String, FieldSchema)]);

impl Serialize for Properties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, field) in self.0 {
            map.serialize_entry(name, field)?;
        }
        map.end()
    }
}

impl Serialize for InputSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("InputSchema", 3)?;
        state.serialize_field("type", "object")?;
        state.serialize_field("properties", &Properties(&self.properties))?;
        state.serialize_field("required", &self.required)?;
        state.end()
    }
}

/// A named operation exposed through `tools/call`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

impl Tool {
    pub fn new(name: &str, description: &str, input_schema: InputSchema) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

/// An ordered, name-indexed catalogue of tools.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool, replacing any earlier tool with the same name in place.
    pub fn register(&mut self, tool: Tool) {
        match self.by_name.get(&tool.name) {
            Some(&index) => self.tools[index] = tool,
            None => {
                self.by_name.insert(tool.name.clone(), self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn with(mut self, tool: Tool) -> Self {
        self.register(tool);
        self
    }

    /// All tools, in registration order.
    pub fn list(&self) -> &[Tool] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.by_name.get(name).map(|&index| &self.tools[index])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .with(Tool::new(
                "join_room",
                "Join a chat room",
                InputSchema::new().required("roomId", FieldSchema::integer("Room").minimum(1.)),
            ))
            .with(Tool::new(
                "create_room",
                "Create a new chat room",
                InputSchema::new()
                    .required("name", FieldSchema::string("Room name").max_length(100))
                    .optional("description", FieldSchema::string("Room description")),
            ))
    }

    #[test]
    fn test_registration_order_is_kept() {
        let registry = registry();
        let names: Vec<_> = registry.list().iter().map(|t| t.name.as_str()).collect();

        assert_eq!(names, ["join_room", "create_room"]);
        assert!(registry.get("create_room").is_some());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_reregistering_replaces_in_place() {
        let mut registry = registry();
        registry.register(Tool::new("join_room", "Replaced", InputSchema::new()));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.list()[0].description, "Replaced");
    }

    #[test]
    fn test_integer_fields_serialize_whole_bounds() {
        let registry = registry();
        let value = serde_json::to_value(registry.get("join_room").unwrap()).unwrap();

        assert_eq!(
            value["inputSchema"]["properties"]["roomId"],
            json!({ "type": "integer", "description": "Room", "minimum": 1 })
        );
    }

    #[test]
    fn test_serializes_as_json_schema() {
        let registry = registry();
        let value = serde_json::to_value(registry.get("create_room").unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "name": "create_room",
                "description": "Create a new chat room",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Room name", "maxLength": 100 },
                        "description": { "type": "string", "description": "Room description" }
                    },
                    "required": ["name"]
                }
            })
        );
    }
}
