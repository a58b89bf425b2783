//! Per-record-type configuration registry.
//!
//! Every record type is configured exactly once; the resulting
//! [`CacheConfig`] is shared by reference with every engine that serves it.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use crate::domain::RecordType;

use super::config::{CacheConfig, ConfigBuilder};
use super::error::CacheError;

/// Closure form of a configuration call.
pub type ConfigBlock<'a> =
    Box<dyn FnOnce(&mut ConfigBuilder) -> Result<(), CacheError> + 'a>;

/// Maps record type names to their write-once [`CacheConfig`].
#[derive(Default)]
pub struct ConfigRegistry {
    configs: DashMap<String, Arc<CacheConfig>>,
}

impl ConfigRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            configs: DashMap::new(),
        }
    }

    /// Configure `record_type` from either a positional index or a block.
    ///
    /// Supplying both is an [`CacheError::ArgModeConflict`]; configuring a type
    /// twice is a [`CacheError::DuplicateConfiguration`]. When the block fails
    /// nothing is committed and the type stays unconfigured.
    pub fn configure(
        &self,
        record_type: Arc<RecordType>,
        index: &[&str],
        block: Option<ConfigBlock<'_>>,
    ) -> Result<Arc<CacheConfig>, CacheError> {
        if !index.is_empty() && block.is_some() {
            return Err(CacheError::arg_mode_conflict(
                "configure with either index columns or a block, not both",
            ));
        }

        let type_name = record_type.name().to_string();
        if self.configs.contains_key(&type_name) {
            return Err(CacheError::DuplicateConfiguration {
                record_type: type_name,
            });
        }

        let mut builder = ConfigBuilder::new(record_type);
        builder.index(index.iter().copied())?;
        if let Some(block) = block {
            block(&mut builder)?;
        }
        let config = Arc::new(builder.build());

        match self.configs.entry(type_name) {
            Entry::Occupied(entry) => Err(CacheError::DuplicateConfiguration {
                record_type: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                info!(
                    record_type = entry.key().as_str(),
                    indexes = config.indexes().len(),
                    counters = config.counters().len(),
                    ttl = ?config.ttl(),
                    "Configured record type cache"
                );
                entry.insert(config.clone());
                Ok(config)
            }
        }
    }

    /// Configure `record_type` with a single positional index.
    pub fn configure_index(
        &self,
        record_type: Arc<RecordType>,
        index: &[&str],
    ) -> Result<Arc<CacheConfig>, CacheError> {
        self.configure(record_type, index, None)
    }

    /// Configure `record_type` through a configuration block.
    pub fn configure_with<F>(
        &self,
        record_type: Arc<RecordType>,
        block: F,
    ) -> Result<Arc<CacheConfig>, CacheError>
    where
        F: FnOnce(&mut ConfigBuilder) -> Result<(), CacheError>,
    {
        self.configure(record_type, &[], Some(Box::new(block)))
    }

    /// Look up the configuration of a record type.
    pub fn get(&self, type_name: &str) -> Result<Arc<CacheConfig>, CacheError> {
        let config = self
            .configs
            .get(type_name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CacheError::unknown_record_type(type_name));
        if config.is_err() {
            debug!(record_type = type_name, "Lookup of unconfigured record type");
        }
        config
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.configs.contains_key(type_name)
    }

    /// Names of all configured record types, sorted.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Get the number of configured record types.
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}
