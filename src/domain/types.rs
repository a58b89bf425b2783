//! Column types and attribute values shared by schemas, records and cache keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Declared type of a record column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Text,
    Integer,
    Boolean,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attribute value.
///
/// Serializes to plain JSON scalars (`null`, `true`, `42`, `"joe"`), which keeps
/// the canonical key encoding injective across mixed value types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns true when the value may be stored in a column of `column_type`.
    ///
    /// `Null` conforms to every type.
    pub fn conforms_to(&self, column_type: ColumnType) -> bool {
        match (self, column_type) {
            (Value::Null, _) => true,
            (Value::Bool(_), ColumnType::Boolean) => true,
            (Value::Integer(_), ColumnType::Integer) => true,
            (Value::Text(_), ColumnType::String | ColumnType::Text) => true,
            _ => false,
        }
    }

    /// Parse a raw command-line or configuration string as a value of `column_type`.
    ///
    /// The literal `null` always parses to [`Value::Null`].
    pub fn parse_as(column: &str, column_type: ColumnType, raw: &str) -> Result<Self, DomainError> {
        if raw == "null" {
            return Ok(Value::Null);
        }
        match column_type {
            ColumnType::String | ColumnType::Text => Ok(Value::Text(raw.to_string())),
            ColumnType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| DomainError::type_mismatch(column, column_type, raw)),
            ColumnType::Boolean => match raw.trim() {
                "true" | "t" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "0" => Ok(Value::Bool(false)),
                _ => Err(DomainError::type_mismatch(column, column_type, raw)),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_serialize_as_plain_json() {
        let encoded = serde_json::to_string(&vec![
            Value::Null,
            Value::Bool(true),
            Value::Integer(7),
            Value::from("joe"),
        ])
        .expect("serialize values");
        assert_eq!(encoded, r#"[null,true,7,"joe"]"#);
    }

    #[test]
    fn string_and_integer_stay_distinct() {
        let as_text = serde_json::to_string(&Value::from("1")).expect("serialize");
        let as_int = serde_json::to_string(&Value::from(1)).expect("serialize");
        assert_ne!(as_text, as_int);
    }

    #[test]
    fn parse_as_respects_column_type() {
        assert_eq!(
            Value::parse_as("points", ColumnType::Integer, "12").expect("integer"),
            Value::Integer(12)
        );
        assert_eq!(
            Value::parse_as("flag", ColumnType::Boolean, "true").expect("boolean"),
            Value::Bool(true)
        );
        assert_eq!(
            Value::parse_as("code", ColumnType::String, "12").expect("string"),
            Value::from("12")
        );
        assert_eq!(
            Value::parse_as("code", ColumnType::String, "null").expect("null"),
            Value::Null
        );
        assert!(Value::parse_as("points", ColumnType::Integer, "twelve").is_err());
    }

    #[test]
    fn null_conforms_to_every_type() {
        for column_type in [
            ColumnType::String,
            ColumnType::Text,
            ColumnType::Integer,
            ColumnType::Boolean,
        ] {
            assert!(Value::Null.conforms_to(column_type));
        }
        assert!(!Value::from("x").conforms_to(ColumnType::Integer));
        assert!(!Value::from(3).conforms_to(ColumnType::Boolean));
    }
}
