//! Counter synchronization.
//!
//! Counters live under their own keys (primary-key index plus the counter name)
//! as bare integers, outside the record snapshot. The cache is authoritative for
//! a counter once its key exists; until then the record's in-memory value seeds
//! it.

use metrics::counter;
use tracing::{debug, trace};

use crate::domain::{Record, Value};

use super::config::CacheConfig;
use super::error::CacheError;
use super::keys::{CacheKey, KeyCodec};
use super::store::{CacheEntry, CacheStore, StoreError};

pub(crate) const METRIC_COUNTER_INCREMENT_TOTAL: &str = "rowcache_counter_increment_total";

/// Counter operations for one record type, borrowed from a
/// [`super::engine::CacheSyncEngine`].
pub struct CounterSync<'a, S: CacheStore> {
    store: &'a S,
    codec: &'a KeyCodec,
    config: &'a CacheConfig,
}

impl<'a, S: CacheStore> CounterSync<'a, S> {
    pub fn new(store: &'a S, codec: &'a KeyCodec, config: &'a CacheConfig) -> Self {
        Self {
            store,
            codec,
            config,
        }
    }

    /// Atomically add `amount` to `counter` and assign the total to `record`.
    ///
    /// The cached counter is seeded from the record's current value first when
    /// it does not exist yet.
    pub fn increment(
        &self,
        record: &mut Record,
        counter: &str,
        amount: i64,
    ) -> Result<i64, CacheError> {
        let (name, key) = self.key_for(record, counter)?;
        self.fetch_or_seed(record, &name, &key)?;

        let total = self.store.increment(key.as_str(), amount)?;
        record.set(&name, total)?;

        debug!(
            record_type = self.config.type_name(),
            counter = name.as_str(),
            amount,
            total,
            "Incremented cached counter"
        );
        counter!(METRIC_COUNTER_INCREMENT_TOTAL, "record_type" => self.config.type_name().to_string())
            .increment(1);
        Ok(total)
    }

    /// Fetch every registered counter into `record`, seeding absent entries
    /// from the record's own values.
    pub fn init_counters(&self, record: &mut Record) -> Result<(), CacheError> {
        for counter in self.config.counters() {
            let (name, key) = self.key_for(record, counter)?;
            let value = self.fetch_or_seed(record, &name, &key)?;
            record.set(&name, value)?;
        }
        Ok(())
    }

    /// Overlay the live counter values on a record reconstructed from a
    /// snapshot. Loaded values count as persisted state, so the record stays
    /// clean.
    pub fn overlay(&self, record: &mut Record) -> Result<(), CacheError> {
        for counter in self.config.counters() {
            let (name, key) = self.key_for(record, counter)?;
            let value = self.fetch_or_seed(record, &name, &key)?;
            record.load(&name, value)?;
        }
        Ok(())
    }

    /// Cached value of `counter` for `record`, without seeding or mutating anything.
    pub fn value(&self, record: &Record, counter: &str) -> Result<Option<i64>, CacheError> {
        let (_, key) = self.key_for(record, counter)?;
        match self.store.read(key.as_str())? {
            Some(entry) => entry
                .as_counter()
                .map(Some)
                .ok_or_else(|| StoreError::NotNumeric { key: key.into_string() }.into()),
            None => Ok(None),
        }
    }

    fn key_for(&self, record: &Record, counter: &str) -> Result<(String, CacheKey), CacheError> {
        let name = crate::domain::normalize_column(counter);
        if !self.config.has_counter(&name) {
            return Err(CacheError::unknown_counter(self.config.type_name(), name));
        }
        let primary_key = record.primary_key_value();
        if primary_key.is_null() {
            return Err(CacheError::missing_primary_key(self.config.type_name()));
        }
        let key = self.codec.counter_key(self.config, primary_key, &name)?;
        Ok((name, key))
    }

    fn fetch_or_seed(&self, record: &Record, name: &str, key: &CacheKey) -> Result<i64, CacheError> {
        let seed = record.get(name).and_then(Value::as_integer).unwrap_or(0);
        let entry = self.store.fetch(key.as_str(), None, || {
            trace!(key = key.as_str(), seed, "Seeding cached counter");
            CacheEntry::Counter(seed)
        })?;
        entry.as_counter().ok_or_else(|| {
            StoreError::NotNumeric {
                key: key.to_string(),
            }
            .into()
        })
    }
}
