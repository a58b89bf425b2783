use thiserror::Error;

use crate::application::repos::RepoError;
use crate::domain::DomainError;

use super::store::StoreError;

/// Errors surfaced by configuration, key derivation and cache synchronization.
///
/// None of these are retried internally. Store and repository failures are
/// carried through unchanged so the caller keeps ownership of retry policy.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("record type `{record_type}` is already configured")]
    DuplicateConfiguration { record_type: String },
    #[error("conflicting arguments: {message}")]
    ArgModeConflict { message: String },
    #[error("`{column}` is not a column of `{record_type}` and cannot be indexed")]
    InvalidIndexColumn { record_type: String, column: String },
    #[error("`{column}` is not an integer column of `{record_type}` and cannot be a counter")]
    InvalidCounterColumn { record_type: String, column: String },
    #[error("column `{column}` of `{record_type}` cannot be both an index and a counter")]
    IndexCounterOverlap { record_type: String, column: String },
    #[error("no index on `{record_type}` matches columns [{}]", .columns.join(", "))]
    UnknownIndex {
        record_type: String,
        columns: Vec<String>,
    },
    #[error("`{counter}` is not a counter of `{record_type}`")]
    UnknownCounter { record_type: String, counter: String },
    #[error("record type `{record_type}` is not configured")]
    UnknownRecordType { record_type: String },
    #[error("expected a `{expected}` record but got `{actual}`")]
    RecordTypeMismatch { expected: String, actual: String },
    #[error("`{record_type}` record has no primary key value")]
    MissingPrimaryKey { record_type: String },
    #[error("key {segment} `{value}` must not contain `:`, `.` or `/`")]
    InvalidKeySegment { segment: &'static str, value: String },
    #[error("failed to encode cache key: {0}")]
    KeyEncoding(#[source] serde_json::Error),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl CacheError {
    pub fn arg_mode_conflict(message: impl Into<String>) -> Self {
        Self::ArgModeConflict {
            message: message.into(),
        }
    }

    pub fn unknown_index(record_type: impl Into<String>, columns: Vec<String>) -> Self {
        Self::UnknownIndex {
            record_type: record_type.into(),
            columns,
        }
    }

    pub fn unknown_counter(record_type: impl Into<String>, counter: impl Into<String>) -> Self {
        Self::UnknownCounter {
            record_type: record_type.into(),
            counter: counter.into(),
        }
    }

    pub fn unknown_record_type(record_type: impl Into<String>) -> Self {
        Self::UnknownRecordType {
            record_type: record_type.into(),
        }
    }

    pub fn invalid_key_segment(segment: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidKeySegment {
            segment,
            value: value.into(),
        }
    }

    pub fn missing_primary_key(record_type: impl Into<String>) -> Self {
        Self::MissingPrimaryKey {
            record_type: record_type.into(),
        }
    }
}
