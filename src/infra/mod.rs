//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod memory_repo;
pub mod telemetry;
