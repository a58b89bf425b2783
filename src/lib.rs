//! Secondary-index cache synchronization for row-oriented record stores.
//!
//! Records are cached as attribute snapshots under one key per configured
//! index, kept in step on write and delete, served read-through on lookup, and
//! paired with atomic counters that live outside the snapshot.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
