//! Declared record schemas.

use std::collections::HashSet;

use super::attributes::Attributes;
use super::error::DomainError;
use super::types::{ColumnType, Value};

/// Characters that delimit the segments of a cache key.
pub const KEY_SEPARATORS: [char; 3] = [':', '.', '/'];

/// Whether `segment` would blur the boundaries between cache key segments.
pub fn contains_key_separator(segment: &str) -> bool {
    segment.contains(KEY_SEPARATORS)
}

/// Canonical spelling of a column name: trimmed and lowercased.
pub fn normalize_column(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    default: Value,
}

impl Column {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: normalize_column(name),
            column_type,
            default: Value::Null,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }
}

/// Schema of one record type: its name, ordered columns and primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    name: String,
    columns: Vec<Column>,
    primary_key: String,
}

impl RecordType {
    pub fn new(
        name: &str,
        primary_key: &str,
        columns: impl IntoIterator<Item = Column>,
    ) -> Result<Self, DomainError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::invalid_record_type(name, "name must not be empty"));
        }
        if contains_key_separator(&name) {
            return Err(DomainError::invalid_record_type(
                name,
                "name must not contain `:`, `.` or `/`",
            ));
        }

        let columns: Vec<Column> = columns.into_iter().collect();
        if columns.is_empty() {
            return Err(DomainError::invalid_record_type(
                name,
                "at least one column is required",
            ));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if column.name.is_empty() {
                return Err(DomainError::invalid_record_type(
                    name,
                    "column names must not be empty",
                ));
            }
            if contains_key_separator(&column.name) {
                return Err(DomainError::invalid_record_type(
                    name,
                    format!("column `{}` must not contain `:`, `.` or `/`", column.name),
                ));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(DomainError::invalid_record_type(
                    name,
                    format!("duplicate column `{}`", column.name),
                ));
            }
            if !column.default.conforms_to(column.column_type) {
                return Err(DomainError::type_mismatch(
                    column.name.clone(),
                    column.column_type,
                    column.default.to_string(),
                ));
            }
        }

        let primary_key = normalize_column(primary_key);
        if !seen.contains(primary_key.as_str()) {
            return Err(DomainError::invalid_record_type(
                name,
                format!("primary key `{primary_key}` is not a column"),
            ));
        }

        Ok(Self {
            name,
            columns,
            primary_key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(Column::name)
    }

    /// Attribute map holding every column's default value.
    pub fn default_attributes(&self) -> Attributes {
        self.columns
            .iter()
            .map(|column| (column.name.as_str(), column.default.clone()))
            .collect()
    }
}
