use thiserror::Error;

use crate::{
    application::repos::RepoError, cache::CacheError, config::LoadError,
    domain::DomainError, infra::error::InfraError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl AppError {
    /// Process exit code reported by the command-line entry point.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 2,
            AppError::Cache(_) | AppError::Domain(_) | AppError::Repo(_) => 1,
            AppError::Infra(_) => 70,
        }
    }
}
