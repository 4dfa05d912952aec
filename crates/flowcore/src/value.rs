use serde::{Deserialize, Serialize};
use std::fmt;

/// Node data, port values and variable values are plain JSON.
pub type Value = serde_json::Value;

/// The value types a port or variable may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Text,
    Number,
    Boolean,
    Image,
    Video,
    Audio,
}

impl ValueType {
    pub const ALL: [ValueType; 6] = [
        ValueType::Text,
        ValueType::Number,
        ValueType::Boolean,
        ValueType::Image,
        ValueType::Video,
        ValueType::Audio,
    ];

    /// Row/column position in lookup tables.
    pub const fn index(self) -> usize {
        match self {
            ValueType::Text => 0,
            ValueType::Number => 1,
            ValueType::Boolean => 2,
            ValueType::Image => 3,
            ValueType::Video => 4,
            ValueType::Audio => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Text => "text",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Image => "image",
            ValueType::Video => "video",
            ValueType::Audio => "audio",
        }
    }

    pub fn is_media(self) -> bool {
        matches!(self, ValueType::Image | ValueType::Video | ValueType::Audio)
    }

    /// Whether `value` already has the JSON shape this type expects.
    /// `null` is accepted for every type.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ValueType::Number, Value::Number(_)) => true,
            (ValueType::Boolean, Value::Bool(_)) => true,
            (ValueType::Text, Value::String(_)) => true,
            (media, Value::String(_)) if media.is_media() => true,
            _ => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short JSON kind name, used in type-mismatch messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// String form of a value when it is spliced into surrounding text.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
