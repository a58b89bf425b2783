//! Secondary-index cache synchronization.
//!
//! Each configured record type gets one snapshot key per index (the primary key
//! index is always present) and one counter key per registered counter column.
//!
//! - [`KeyCodec`] derives keys from index column values
//! - [`ConfigRegistry`] holds the write-once [`CacheConfig`] of each type
//! - [`CacheSyncEngine`] writes, deletes and reads snapshots
//! - [`CounterSync`] keeps counters atomic in the [`CacheStore`]

mod config;
mod counters;
mod engine;
mod error;
mod keys;
pub(crate) mod lock;
mod registry;
mod store;

pub use config::{
    CacheConfig, ConfigBuilder, DEFAULT_STORE_CAPACITY, IndexDefinition, StoreConfig, Ttl,
    TtlProvider,
};
pub use counters::CounterSync;
pub use engine::{CacheSyncEngine, ReadOptions};
pub use error::CacheError;
pub use keys::{CacheKey, DEFAULT_NAMESPACE, DEFAULT_VERSION, KeyCodec};
pub use registry::{ConfigBlock, ConfigRegistry};
pub use store::{CacheEntry, CacheStore, MemoryStore, StoreError};

/// Names of every metric emitted by this module.
pub(crate) mod metric_names {
    pub(crate) use super::counters::METRIC_COUNTER_INCREMENT_TOTAL;
    pub(crate) use super::engine::{
        METRIC_FIND_FALLBACK_TOTAL, METRIC_READ_HIT_TOTAL, METRIC_READ_MISS_TOTAL,
    };
    pub(crate) use super::store::METRIC_STORE_EVICT_TOTAL;
}
