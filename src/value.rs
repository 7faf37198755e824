//! Value ↔ schema boundary.
//!
//! Parameters, configs and results all travel as plain `serde_json::Value`s.
//! An executor declares a [`Schema`] for what it accepts, and
//! [`Schema::convert`] checks and coerces an incoming value against it before
//! anything with side effects runs. Nothing here looks at business meaning.

use serde_json::{Map, Value};

use crate::error::Error;

/// The shape a single field's value must take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// Free-form JSON document (an HTTP request body).
    Body,
}

impl FieldKind {
    /// Map a JSON schema onto a field kind. Untyped schemas are strings.
    pub fn from_json_schema(schema: &Value) -> Self {
        match schema.get("type").and_then(Value::as_str) {
            Some("integer") => Self::Integer,
            Some("number") => Self::Number,
            Some("boolean") => Self::Boolean,
            Some("array") => Self::Array,
            Some("object") => Self::Object,
            _ => Self::String,
        }
    }

    /// Coerce a value into this kind. Strings are accepted for every scalar
    /// kind since command-line input always arrives as text.
    fn coerce(self, value: &Value) -> Result<Value, String> {
        match (self, value) {
            (Self::Body, v) => Ok(v.clone()),
            (Self::String, Value::String(_)) => Ok(value.clone()),
            (Self::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (Self::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
            (Self::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            (Self::Integer, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("`{s}` is not an integer")),
            (Self::Number, Value::Number(_)) => Ok(value.clone()),
            (Self::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("`{s}` is not a number")),
            (Self::Boolean, Value::Bool(_)) => Ok(value.clone()),
            (Self::Boolean, Value::String(s)) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(format!("`{s}` is not a boolean")),
            },
            (Self::Array, Value::Array(_)) | (Self::Object, Value::Object(_)) => Ok(value.clone()),
            (Self::Array | Self::Object, Value::String(s)) => {
                let parsed: Value =
                    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))?;
                if parsed.is_string() {
                    return Err(format!("expected {}", self.label()));
                }
                self.coerce(&parsed)
            }
            (kind, other) => Err(format!(
                "expected {}, got {}",
                kind.label(),
                type_name(other)
            )),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Integer => "an integer",
            Self::Number => "a number",
            Self::Boolean => "a boolean",
            Self::Array => "an array",
            Self::Object => "an object",
            Self::Body => "a JSON document",
        }
    }
}

/// A single declared field.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Field {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: false,
            kind,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Ordered set of fields an executor accepts for its parameters or configs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. A field whose name is already declared is ignored.
    pub fn field(mut self, field: Field) -> Self {
        if self.get(&field.name).is_none() {
            self.fields.push(field);
        }
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check `value` against the declared fields and coerce each entry to its
    /// field kind. `null` counts as an empty object; unknown keys and missing
    /// required fields are rejected.
    pub fn convert(&self, value: &Value) -> Result<Map<String, Value>, Error> {
        let empty = Map::new();
        let input = match value {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => {
                return Err(Error::validation(
                    "<root>",
                    format!("expected an object, got {}", type_name(other)),
                ))
            }
        };

        if let Some(unknown) = input.keys().find(|key| self.get(key).is_none()) {
            return Err(Error::validation(unknown.as_str(), "unknown field"));
        }

        let mut converted = Map::new();
        for field in &self.fields {
            match input.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(Error::validation(
                            field.name.as_str(),
                            "required field is missing",
                        ));
                    }
                }
                Some(v) => {
                    let coerced = field
                        .kind
                        .coerce(v)
                        .map_err(|reason| Error::validation(field.name.as_str(), reason))?;
                    converted.insert(field.name.clone(), coerced);
                }
            }
        }
        Ok(converted)
    }
}

/// Render a scalar value the way it appears in URLs, headers and prompts.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
