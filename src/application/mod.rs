//! Application-facing error surface and persistence contracts.

pub mod error;
pub mod repos;
