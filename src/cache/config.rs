//! Cache configuration.
//!
//! [`CacheConfig`] is the write-once, per-record-type set of index definitions,
//! counter definitions and expiry policy. [`StoreConfig`] sizes the bundled
//! in-memory store.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{ColumnType, RecordType, normalize_column};

use super::error::CacheError;

pub const DEFAULT_STORE_CAPACITY: usize = 10_000;

/// Sizing for [`super::store::MemoryStore`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of entries kept before LRU eviction.
    pub capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_STORE_CAPACITY,
        }
    }
}

impl From<&crate::config::StoreSettings> for StoreConfig {
    fn from(settings: &crate::config::StoreSettings) -> Self {
        Self {
            capacity: settings.capacity,
        }
    }
}

impl StoreConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

/// A registered lookup key: a sorted, deduplicated set of column names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexDefinition(Vec<String>);

impl IndexDefinition {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut columns: Vec<String> = columns
            .into_iter()
            .map(|column| normalize_column(column.as_ref()))
            .collect();
        columns.sort();
        columns.dedup();
        Self(columns)
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|name| name == column)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IndexDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

pub type TtlProvider = Arc<dyn Fn() -> Duration + Send + Sync>;

/// Expiry policy for snapshot entries, resolved once per write.
#[derive(Clone, Default)]
pub enum Ttl {
    #[default]
    Never,
    Fixed(Duration),
    Provider(TtlProvider),
}

impl Ttl {
    pub fn fixed(duration: Duration) -> Self {
        Ttl::Fixed(duration)
    }

    pub fn provider(provider: impl Fn() -> Duration + Send + Sync + 'static) -> Self {
        Ttl::Provider(Arc::new(provider))
    }

    /// Build a policy from at most one of a fixed value and a provider.
    pub fn from_parts(
        fixed: Option<Duration>,
        provider: Option<TtlProvider>,
    ) -> Result<Self, CacheError> {
        match (fixed, provider) {
            (Some(_), Some(_)) => Err(CacheError::arg_mode_conflict(
                "expiry takes either a fixed duration or a provider, not both",
            )),
            (Some(duration), None) => Ok(Ttl::Fixed(duration)),
            (None, Some(provider)) => Ok(Ttl::Provider(provider)),
            (None, None) => Ok(Ttl::Never),
        }
    }

    pub fn resolve(&self) -> Option<Duration> {
        match self {
            Ttl::Never => None,
            Ttl::Fixed(duration) => Some(*duration),
            Ttl::Provider(provider) => Some(provider()),
        }
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Ttl::Fixed(duration)
    }
}

impl fmt::Debug for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Never => f.write_str("Never"),
            Ttl::Fixed(duration) => f.debug_tuple("Fixed").field(duration).finish(),
            Ttl::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

/// Index, counter and expiry configuration of one record type.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    record_type: Arc<RecordType>,
    indexes: Vec<IndexDefinition>,
    counters: Vec<String>,
    ttl: Ttl,
}

impl CacheConfig {
    fn new(record_type: Arc<RecordType>) -> Self {
        let primary = IndexDefinition::new([record_type.primary_key()]);
        Self {
            record_type,
            indexes: vec![primary],
            counters: Vec::new(),
            ttl: Ttl::Never,
        }
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record_type
    }

    pub fn type_name(&self) -> &str {
        self.record_type.name()
    }

    /// All index definitions; the primary-key index is always first.
    pub fn indexes(&self) -> &[IndexDefinition] {
        &self.indexes
    }

    pub fn primary_index(&self) -> &IndexDefinition {
        &self.indexes[0]
    }

    pub fn has_index(&self, index: &IndexDefinition) -> bool {
        self.indexes.contains(index)
    }

    pub fn counters(&self) -> &[String] {
        &self.counters
    }

    pub fn has_counter(&self, name: &str) -> bool {
        self.counters.iter().any(|counter| counter == name)
    }

    pub fn ttl(&self) -> &Ttl {
        &self.ttl
    }

    /// Expiry to apply to a write happening now.
    pub fn expires_in(&self) -> Option<Duration> {
        self.ttl.resolve()
    }

    fn overlapping_column(&self) -> Option<&str> {
        self.indexes
            .iter()
            .flat_map(IndexDefinition::iter)
            .find(|column| self.has_counter(column))
    }
}

/// Mutable view used while configuring a record type.
///
/// Each call validates before committing, and a failed call leaves the effects
/// of earlier successful calls in place.
#[derive(Debug)]
pub struct ConfigBuilder {
    config: CacheConfig,
}

impl ConfigBuilder {
    pub fn new(record_type: Arc<RecordType>) -> Self {
        Self {
            config: CacheConfig::new(record_type),
        }
    }

    /// Register one index over `columns`. An empty list is a no-op.
    pub fn index<I, S>(&mut self, columns: I) -> Result<&mut Self, CacheError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let index = IndexDefinition::new(columns);
        if index.is_empty() {
            return Ok(self);
        }

        let record_type = &self.config.record_type;
        if let Some(column) = index.iter().find(|column| !record_type.has_column(column)) {
            return Err(CacheError::InvalidIndexColumn {
                record_type: record_type.name().to_string(),
                column: column.to_string(),
            });
        }

        if self.config.has_index(&index) {
            return Ok(self);
        }

        self.config.indexes.push(index);
        if let Err(err) = self.validate() {
            self.config.indexes.pop();
            return Err(err);
        }
        Ok(self)
    }

    /// Register integer columns as counters. An empty list is a no-op.
    pub fn counters<I, S>(&mut self, columns: I) -> Result<&mut Self, CacheError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counters: Vec<String> = Vec::new();
        for column in columns {
            let column = normalize_column(column.as_ref());
            if !counters.contains(&column) {
                counters.push(column);
            }
        }

        let record_type = &self.config.record_type;
        if let Some(column) = counters.iter().find(|column| {
            record_type
                .column(column)
                .is_none_or(|found| found.column_type() != ColumnType::Integer)
        }) {
            return Err(CacheError::InvalidCounterColumn {
                record_type: record_type.name().to_string(),
                column: column.clone(),
            });
        }

        let committed = self.config.counters.len();
        for counter in counters {
            if !self.config.has_counter(&counter) {
                self.config.counters.push(counter);
            }
        }
        if let Err(err) = self.validate() {
            self.config.counters.truncate(committed);
            return Err(err);
        }
        Ok(self)
    }

    pub fn expires_in(&mut self, ttl: impl Into<Ttl>) -> &mut Self {
        self.config.ttl = ttl.into();
        self
    }

    pub fn indexes(&self) -> &[IndexDefinition] {
        self.config.indexes()
    }

    pub fn counter_names(&self) -> &[String] {
        self.config.counters()
    }

    pub fn build(self) -> CacheConfig {
        self.config
    }

    fn validate(&self) -> Result<(), CacheError> {
        match self.config.overlapping_column() {
            Some(column) => Err(CacheError::IndexCounterOverlap {
                record_type: self.config.type_name().to_string(),
                column: column.to_string(),
            }),
            None => Ok(()),
        }
    }
}
