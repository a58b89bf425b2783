use thiserror::Error;

use super::types::ColumnType;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("record type `{record_type}` is invalid: {message}")]
    InvalidRecordType {
        record_type: String,
        message: String,
    },
    #[error("record type `{record_type}` has no column `{column}`")]
    UnknownAttribute { record_type: String, column: String },
    #[error("column `{column}` expects {expected} but got `{value}`")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        value: String,
    },
}

impl DomainError {
    pub fn invalid_record_type(record_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRecordType {
            record_type: record_type.into(),
            message: message.into(),
        }
    }

    pub fn unknown_attribute(record_type: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            record_type: record_type.into(),
            column: column.into(),
        }
    }

    pub fn type_mismatch(
        column: impl Into<String>,
        expected: ColumnType,
        value: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            column: column.into(),
            expected,
            value: value.into(),
        }
    }
}
