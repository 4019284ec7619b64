use std::fmt::Display;

use chrono::DateTime;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{FieldKind, InputSchema, StringFormat};

/// A single problem with a tool call's arguments, always naming the field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Arguments must be an object, got {actual}")]
    NotAnObject { actual: &'static str },
    #[error("Missing required field: {field}")]
    MissingRequiredField { field: String },
    #[error("Unknown field: {field}")]
    UnknownField { field: String },
    #[error("Field '{field}' must be of type {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Field '{field}' must be at least {min} characters")]
    TooShort { field: String, min: usize },
    #[error("Field '{field}' must be at most {max} characters")]
    TooLong { field: String, max: usize },
    #[error("Field '{field}' must be at least {min}")]
    BelowMinimum { field: String, min: f64 },
    #[error("Field '{field}' must be at most {max}")]
    AboveMaximum { field: String, max: f64 },
    #[error("Field '{field}' must be a valid {format}")]
    InvalidFormat { field: String, format: &'static str },
}

/// Every problem found with a set of arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn first(&self) -> Option<&ValidationError> {
        self.0.first()
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<_> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Returns the JSON type name of a value, as used in error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Checks tool arguments against a schema.
///
/// Missing arguments (`null`) are treated as an empty object. Fields that the
/// schema doesn't declare are rejected.
pub fn validate(schema: &InputSchema, arguments: &Value) -> Result<(), ValidationErrors> {
    let empty = Map::new();

    let arguments = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(ValidationErrors(vec![ValidationError::NotAnObject {
                actual: json_type_name(other),
            }]))
        }
    };

    let mut errors = Vec::new();

    for field in schema.required_fields() {
        if !arguments.contains_key(field) {
            errors.push(ValidationError::MissingRequiredField {
                field: field.clone(),
            });
        }
    }

    for (name, value) in arguments {
        let Some(property) = schema.property(name) else {
            errors.push(ValidationError::UnknownField {
                field: name.clone(),
            });
            continue;
        };

        if let Err(error) = validate_field(name, &property.kind, value) {
            errors.push(error);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

fn validate_field(name: &str, kind: &FieldKind, value: &Value) -> Result<(), ValidationError> {
    let mismatch = || ValidationError::TypeMismatch {
        field: name.to_string(),
        expected: kind.type_name(),
        actual: json_type_name(value),
    };

    match kind {
        FieldKind::Number { minimum, maximum } => {
            let number = value.as_f64().ok_or_else(mismatch)?;

            if let Some(min) = *minimum {
                if number < min {
                    return Err(ValidationError::BelowMinimum {
                        field: name.to_string(),
                        min,
                    });
                }
            }

            if let Some(max) = *maximum {
                if number > max {
                    return Err(ValidationError::AboveMaximum {
                        field: name.to_string(),
                        max,
                    });
                }
            }
        }
        FieldKind::Integer { minimum, maximum } => {
            // Fractions and floats like 1e20 don't fit an id or an index
            let number = value.as_i64().ok_or_else(mismatch)?;

            if let Some(min) = *minimum {
                if number < min {
                    return Err(ValidationError::BelowMinimum {
                        field: name.to_string(),
                        min: min as f64,
                    });
                }
            }

            if let Some(max) = *maximum {
                if number > max {
                    return Err(ValidationError::AboveMaximum {
                        field: name.to_string(),
                        max: max as f64,
                    });
                }
            }
        }
        FieldKind::String {
            min_length,
            max_length,
            format,
        } => {
            let string = value.as_str().ok_or_else(mismatch)?;
            let length = string.chars().count();

            if let Some(min) = *min_length {
                if length < min {
                    return Err(ValidationError::TooShort {
                        field: name.to_string(),
                        min,
                    });
                }
            }

            if let Some(max) = *max_length {
                if length > max {
                    return Err(ValidationError::TooLong {
                        field: name.to_string(),
                        max,
                    });
                }
            }

            if let Some(StringFormat::DateTime) = format {
                DateTime::parse_from_rfc3339(string).map_err(|_| {
                    ValidationError::InvalidFormat {
                        field: name.to_string(),
                        format: StringFormat::DateTime.as_str(),
                    }
                })?;
            }
        }
        FieldKind::Boolean => {
            value.as_bool().ok_or_else(mismatch)?;
        }
    }

    Ok(())
}
