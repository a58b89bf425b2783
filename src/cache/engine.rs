//! Write-through, delete and read-through synchronization for one record type.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::application::repos::RecordStore;
use crate::domain::{Attributes, Record};

use super::config::CacheConfig;
use super::counters::CounterSync;
use super::error::CacheError;
use super::keys::{CacheKey, KeyCodec};
use super::store::{CacheEntry, CacheStore};

pub(crate) const METRIC_READ_HIT_TOTAL: &str = "rowcache_read_hit_total";
pub(crate) const METRIC_READ_MISS_TOTAL: &str = "rowcache_read_miss_total";
pub(crate) const METRIC_FIND_FALLBACK_TOTAL: &str = "rowcache_find_fallback_total";

/// Options for [`CacheSyncEngine::read`] and [`CacheSyncEngine::find`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Return counters as stored in the snapshot instead of the live values.
    pub skip_counters: bool,
}

impl ReadOptions {
    pub fn skip_counters() -> Self {
        Self {
            skip_counters: true,
        }
    }
}

/// Keeps the cache entries of one record type in step with the system of record.
pub struct CacheSyncEngine<S: CacheStore> {
    store: Arc<S>,
    codec: KeyCodec,
    config: Arc<CacheConfig>,
}

impl<S: CacheStore> Clone for CacheSyncEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            codec: self.codec.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: CacheStore> CacheSyncEngine<S> {
    pub fn new(store: Arc<S>, codec: KeyCodec, config: Arc<CacheConfig>) -> Self {
        Self {
            store,
            codec,
            config,
        }
    }

    pub fn config(&self) -> &Arc<CacheConfig> {
        &self.config
    }

    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn counters(&self) -> CounterSync<'_, S> {
        CounterSync::new(self.store.as_ref(), &self.codec, &self.config)
    }

    /// Snapshot keys of every configured index evaluated against `attrs`.
    pub fn keys(&self, attrs: &Attributes) -> Result<Vec<CacheKey>, CacheError> {
        self.config
            .indexes()
            .iter()
            .map(|index| self.codec.derive_key(&self.config, index, attrs, None))
            .collect()
    }

    /// Write the snapshot of `record` under every index key and retire the keys
    /// of `prior` that no longer apply.
    ///
    /// `prior` holds the attribute values before the change; columns it omits
    /// are taken from the current values. Registered counters are then fetched
    /// into `record`, seeding any that are not cached yet.
    pub fn write(&self, record: &mut Record, prior: Option<&Attributes>) -> Result<(), CacheError> {
        self.ensure_record_type(record)?;
        if record.primary_key_value().is_null() {
            return Err(CacheError::missing_primary_key(self.config.type_name()));
        }

        let current = record.attributes().clone();
        let current_keys = self.keys(&current)?;
        let ttl = self.config.expires_in();
        let entry = CacheEntry::snapshot(current.clone());
        for key in &current_keys {
            self.store.write(key.as_str(), entry.clone(), ttl)?;
        }

        if let Some(prior) = prior {
            let prior_keys = self.keys(&current.overlay(prior))?;
            for key in prior_keys.iter().filter(|key| !current_keys.contains(key)) {
                debug!(key = key.as_str(), "Retiring stale cache key");
                self.store.delete(key.as_str())?;
            }
        }

        debug!(
            record_type = self.config.type_name(),
            keys = current_keys.len(),
            "Wrote record snapshot"
        );
        self.counters().init_counters(record)
    }

    /// Write `record` using its own change tracking for the prior values.
    ///
    /// Before a commit the prior values are the pending changes' originals;
    /// after a commit they are the values the last save replaced.
    pub fn write_changes(&self, record: &mut Record) -> Result<(), CacheError> {
        let prior = if record.is_persisted() && record.has_changes() {
            Some(record.attributes_before_changes())
        } else {
            record.attributes_before_last_save().cloned()
        };
        self.write(record, prior.as_ref())
    }

    /// Remove the snapshot keys of `record`.
    ///
    /// `snapshot` holds the values as they were before deletion and overrides
    /// the current values, so edits made after loading do not hide the
    /// persisted keys.
    pub fn delete(&self, record: &Record, snapshot: &Attributes) -> Result<(), CacheError> {
        self.ensure_record_type(record)?;
        let attrs = record.attributes().overlay(snapshot);
        let keys = self.keys(&attrs)?;
        for key in &keys {
            self.store.delete(key.as_str())?;
        }
        debug!(
            record_type = self.config.type_name(),
            keys = keys.len(),
            "Deleted record snapshot"
        );
        Ok(())
    }

    /// Delete `record` using its persisted values as the snapshot.
    pub fn delete_record(&self, record: &Record) -> Result<(), CacheError> {
        self.delete(record, &record.attributes_before_changes())
    }

    /// Look up a record by exactly the columns of one configured index.
    ///
    /// A miss is `Ok(None)`. Hits are reconstructed as persisted records with
    /// live counter values unless `options.skip_counters` is set.
    pub fn read(&self, attrs: &Attributes, options: ReadOptions) -> Result<Option<Record>, CacheError> {
        let key = self.codec.lookup_key(&self.config, attrs, None)?;
        let attributes = match self.store.read(key.as_str())? {
            Some(CacheEntry::Snapshot { attributes }) => attributes,
            Some(CacheEntry::Counter(_)) => {
                warn!(key = key.as_str(), "Snapshot key holds a counter; treating as miss");
                return Ok(self.miss());
            }
            None => return Ok(self.miss()),
        };

        let mut record = match Record::from_attributes(self.config.record_type().clone(), &attributes) {
            Ok(record) => record,
            Err(err) => {
                warn!(key = key.as_str(), error = %err, "Undecodable snapshot; treating as miss");
                return Ok(self.miss());
            }
        };
        record.mark_persisted();
        if !options.skip_counters {
            self.counters().overlay(&mut record)?;
        }

        counter!(METRIC_READ_HIT_TOTAL, "record_type" => self.config.type_name().to_string())
            .increment(1);
        Ok(Some(record))
    }

    /// Read-through lookup: serve from the cache, else load from `records` and
    /// populate the cache with the result.
    pub fn find<R>(
        &self,
        attrs: &Attributes,
        options: ReadOptions,
        records: &R,
    ) -> Result<Option<Record>, CacheError>
    where
        R: RecordStore + ?Sized,
    {
        if let Some(record) = self.read(attrs, options)? {
            return Ok(Some(record));
        }

        counter!(METRIC_FIND_FALLBACK_TOTAL, "record_type" => self.config.type_name().to_string())
            .increment(1);
        match records.find_one(self.config.record_type(), attrs)? {
            Some(mut record) => {
                self.write(&mut record, None)?;
                Ok(Some(record))
            }
            None => {
                debug!(record_type = self.config.type_name(), "Record not found in store");
                Ok(None)
            }
        }
    }

    /// See [`CounterSync::increment`].
    pub fn increment(&self, record: &mut Record, counter: &str, amount: i64) -> Result<i64, CacheError> {
        self.ensure_record_type(record)?;
        self.counters().increment(record, counter, amount)
    }

    fn miss(&self) -> Option<Record> {
        counter!(METRIC_READ_MISS_TOTAL, "record_type" => self.config.type_name().to_string())
            .increment(1);
        None
    }

    fn ensure_record_type(&self, record: &Record) -> Result<(), CacheError> {
        let actual = record.record_type().name();
        if actual != self.config.type_name() {
            return Err(CacheError::RecordTypeMismatch {
                expected: self.config.type_name().to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::attrs;
    use crate::cache::config::ConfigBuilder;
    use crate::cache::store::MemoryStore;
    use crate::domain::{Column, ColumnType, RecordType, Value};

    fn users() -> Arc<RecordType> {
        Arc::new(
            RecordType::new(
                "users",
                "id",
                [
                    Column::new("id", ColumnType::Integer),
                    Column::new("name", ColumnType::String),
                    Column::new("code", ColumnType::String),
                    Column::new("points", ColumnType::Integer).with_default(0),
                ],
            )
            .expect("valid record type"),
        )
    }

    fn engine() -> CacheSyncEngine<MemoryStore> {
        let mut builder = ConfigBuilder::new(users());
        builder.index(["code"]).expect("index");
        builder.counters(["points"]).expect("counters");
        CacheSyncEngine::new(
            Arc::new(MemoryStore::default()),
            KeyCodec::default(),
            Arc::new(builder.build()),
        )
    }

    fn persisted(engine: &CacheSyncEngine<MemoryStore>, attrs: &Attributes) -> Record {
        let mut record =
            Record::from_attributes(engine.config().record_type().clone(), attrs).expect("record");
        record.mark_persisted();
        record
    }

    #[test]
    fn write_populates_every_index() {
        let engine = engine();
        let mut record = persisted(&engine, &attrs! { "id" => 1, "name" => "joe", "code" => "j1" });
        engine.write(&mut record, None).expect("write");

        let by_id = engine
            .read(&attrs! { "id" => 1 }, ReadOptions::default())
            .expect("read")
            .expect("hit");
        let by_code = engine
            .read(&attrs! { "code" => "j1" }, ReadOptions::default())
            .expect("read")
            .expect("hit");
        assert_eq!(by_id, record);
        assert_eq!(by_code, record);
        assert!(by_id.is_persisted());
    }

    #[test]
    fn write_retires_changed_index_keys() {
        let engine = engine();
        let mut record = persisted(&engine, &attrs! { "id" => 1, "name" => "joe", "code" => "j1" });
        engine.write(&mut record, None).expect("write");

        record.set("code", "j2").expect("set");
        engine.write_changes(&mut record).expect("write changes");

        assert!(engine
            .read(&attrs! { "code" => "j1" }, ReadOptions::default())
            .expect("read")
            .is_none());
        assert!(engine
            .read(&attrs! { "code" => "j2" }, ReadOptions::default())
            .expect("read")
            .is_some());
    }

    #[test]
    fn write_requires_primary_key() {
        let engine = engine();
        let mut record = Record::new(engine.config().record_type().clone());
        assert!(matches!(
            engine.write(&mut record, None),
            Err(CacheError::MissingPrimaryKey { .. })
        ));
    }

    #[test]
    fn write_rejects_foreign_record_type() {
        let engine = engine();
        let accounts = Arc::new(
            RecordType::new("accounts", "id", [Column::new("id", ColumnType::Integer)])
                .expect("valid record type"),
        );
        let mut record = Record::from_attributes(accounts, &attrs! { "id" => 1 }).expect("record");
        assert!(matches!(
            engine.write(&mut record, None),
            Err(CacheError::RecordTypeMismatch { .. })
        ));
    }

    #[test]
    fn delete_uses_snapshot_values() {
        let engine = engine();
        let mut record = persisted(&engine, &attrs! { "id" => 1, "name" => "joe", "code" => "j1" });
        engine.write(&mut record, None).expect("write");

        record.set("code", "edited").expect("set");
        engine.delete_record(&record).expect("delete");

        assert!(engine
            .read(&attrs! { "id" => 1 }, ReadOptions::default())
            .expect("read")
            .is_none());
        assert!(engine
            .read(&attrs! { "code" => "j1" }, ReadOptions::default())
            .expect("read")
            .is_none());
    }

    #[test]
    fn read_overlays_live_counters() {
        let engine = engine();
        let mut record = persisted(&engine, &attrs! { "id" => 1, "name" => "joe", "code" => "j1" });
        engine.write(&mut record, None).expect("write");
        engine.increment(&mut record, "points", 4).expect("increment");

        let live = engine
            .read(&attrs! { "id" => 1 }, ReadOptions::default())
            .expect("read")
            .expect("hit");
        assert_eq!(live.get("points"), Some(&Value::Integer(4)));

        let raw = engine
            .read(&attrs! { "id" => 1 }, ReadOptions::skip_counters())
            .expect("read")
            .expect("hit");
        assert_eq!(raw.get("points"), Some(&Value::Integer(0)));
    }

    #[test]
    fn counter_entry_under_snapshot_key_is_a_miss() {
        let engine = engine();
        let key = engine
            .codec()
            .lookup_key(engine.config(), &attrs! { "id" => 1 }, None)
            .expect("key");
        engine
            .store()
            .write(key.as_str(), CacheEntry::Counter(1), None)
            .expect("write");
        assert!(engine
            .read(&attrs! { "id" => 1 }, ReadOptions::default())
            .expect("read")
            .is_none());
    }

    #[test]
    fn read_rejects_unconfigured_index() {
        let engine = engine();
        assert!(matches!(
            engine.read(&attrs! { "name" => "joe" }, ReadOptions::default()),
            Err(CacheError::UnknownIndex { .. })
        ));
    }

    #[test]
    fn snapshots_expire_with_ttl() {
        let mut builder = ConfigBuilder::new(users());
        builder.expires_in(Duration::from_millis(5));
        let engine = CacheSyncEngine::new(
            Arc::new(MemoryStore::default()),
            KeyCodec::default(),
            Arc::new(builder.build()),
        );
        let mut record = persisted(&engine, &attrs! { "id" => 1, "name" => "joe" });
        engine.write(&mut record, None).expect("write");
        std::thread::sleep(Duration::from_millis(20));
        assert!(engine
            .read(&attrs! { "id" => 1 }, ReadOptions::default())
            .expect("read")
            .is_none());
    }
}
