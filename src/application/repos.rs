//! Repository traits describing the system of record.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::{Attributes, DomainError, Record, RecordType};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Read access the cache falls back to on a miss.
pub trait RecordStore: Send + Sync {
    /// First record of `record_type` whose attributes equal every entry of
    /// `attrs`, marked persisted.
    fn find_one(
        &self,
        record_type: &Arc<RecordType>,
        attrs: &Attributes,
    ) -> Result<Option<Record>, RepoError>;
}
