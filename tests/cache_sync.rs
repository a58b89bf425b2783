//! End-to-end synchronization behavior of the cache engine against the
//! in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use rowcache::attrs;
use rowcache::cache::{
    CacheError, CacheSyncEngine, ConfigBuilder, ConfigRegistry, IndexDefinition, KeyCodec,
    MemoryStore, ReadOptions, Ttl,
};
use rowcache::domain::{Attributes, Column, ColumnType, DomainError, Record, RecordType, Value};
use rowcache::infra::memory_repo::MemoryRecordStore;

fn users() -> Arc<RecordType> {
    Arc::new(
        RecordType::new(
            "users",
            "id",
            [
                Column::new("id", ColumnType::Integer),
                Column::new("code", ColumnType::String),
                Column::new("name", ColumnType::String),
                Column::new("first", ColumnType::String),
                Column::new("last", ColumnType::String),
                Column::new("points", ColumnType::Integer).with_default(0),
            ],
        )
        .expect("valid record type"),
    )
}

fn engine(registry: &ConfigRegistry) -> CacheSyncEngine<MemoryStore> {
    let config = registry
        .configure_with(users(), |c| {
            c.index(["code"])?;
            c.index(["name"])?;
            c.index(["first", "last"])?;
            c.counters(["points"])?;
            Ok(())
        })
        .expect("configure users");
    CacheSyncEngine::new(Arc::new(MemoryStore::default()), KeyCodec::default(), config)
}

fn saved(engine: &CacheSyncEngine<MemoryStore>, attrs: &Attributes) -> Record {
    let mut record =
        Record::from_attributes(engine.config().record_type().clone(), attrs).expect("record");
    record.mark_persisted();
    engine.write(&mut record, None).expect("write");
    record
}

fn joe() -> Attributes {
    attrs! {
        "id" => 1,
        "code" => "x",
        "name" => "joe",
        "first" => "Joe",
        "last" => "Schmoe",
    }
}

fn hit(engine: &CacheSyncEngine<MemoryStore>, attrs: &Attributes) -> Option<Record> {
    engine
        .read(attrs, ReadOptions::default())
        .expect("read should not fail")
}

#[test]
fn keys_ignore_attribute_order() {
    let registry = ConfigRegistry::new();
    let engine = engine(&registry);
    let index = IndexDefinition::new(["last", "first"]);

    let forward = attrs! { "first" => "Joe", "last" => "Schmoe" };
    let mut backward = Attributes::new();
    backward.insert("last", "Schmoe");
    backward.insert("first", "Joe");

    let codec = engine.codec();
    assert_eq!(
        codec
            .derive_key(engine.config(), &index, &forward, None)
            .expect("key"),
        codec
            .derive_key(engine.config(), &index, &backward, None)
            .expect("key")
    );
}

#[test]
fn write_then_read_every_index() {
    let registry = ConfigRegistry::new();
    let engine = engine(&registry);
    let record = saved(&engine, &joe());

    for lookup in [
        attrs! { "id" => 1 },
        attrs! { "code" => "x" },
        attrs! { "name" => "joe" },
        attrs! { "last" => "Schmoe", "first" => "Joe" },
    ] {
        let found = hit(&engine, &lookup).expect("cache hit");
        assert_eq!(found, record);
        assert!(found.is_persisted());
        assert!(!found.is_new_record());
    }
}

#[test]
fn changed_index_values_retire_stale_keys() {
    let registry = ConfigRegistry::new();
    let engine = engine(&registry);
    let mut record = saved(&engine, &joe());

    record.set("name", "jane").expect("set name");
    engine
        .write(&mut record, Some(&attrs! { "code" => "x", "name" => "joe" }))
        .expect("write");

    assert!(hit(&engine, &attrs! { "name" => "joe" }).is_none());
    assert_eq!(
        hit(&engine, &attrs! { "name" => "jane" })
            .expect("new name hit")
            .get("name"),
        Some(&Value::from("jane"))
    );
    assert_eq!(
        hit(&engine, &attrs! { "code" => "x" })
            .expect("unaffected index hit")
            .get("name"),
        Some(&Value::from("jane"))
    );
}

#[test]
fn counters_converge_across_shells() {
    let registry = ConfigRegistry::new();
    let engine = engine(&registry);
    saved(&engine, &joe());

    let mut first = hit(&engine, &attrs! { "id" => 1 }).expect("first shell");
    let mut second = hit(&engine, &attrs! { "code" => "x" }).expect("second shell");
    assert_eq!(engine.increment(&mut first, "points", 1).expect("increment"), 1);
    assert_eq!(engine.increment(&mut second, "points", 1).expect("increment"), 2);

    for lookup in [attrs! { "id" => 1 }, attrs! { "name" => "joe" }] {
        let shell = hit(&engine, &lookup).expect("hit");
        assert_eq!(shell.get("points"), Some(&Value::Integer(2)));
    }
}

#[test]
fn concurrent_increments_are_not_lost() {
    let registry = ConfigRegistry::new();
    let engine = engine(&registry);
    saved(&engine, &joe());

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let engine = engine.clone();
            scope.spawn(move || {
                let mut shell = engine
                    .read(&attrs! { "id" => 1 }, ReadOptions::default())
                    .expect("read")
                    .expect("hit");
                for _ in 0..25 {
                    engine
                        .increment(&mut shell, "points", 1)
                        .expect("increment");
                }
            });
        }
    });

    let shell = hit(&engine, &attrs! { "id" => 1 }).expect("hit");
    assert_eq!(shell.get("points"), Some(&Value::Integer(200)));
}

#[test]
fn delete_removes_every_index_key() {
    let registry = ConfigRegistry::new();
    let engine = engine(&registry);
    let record = saved(&engine, &joe());

    engine.delete(&record, &joe()).expect("delete");

    for lookup in [
        attrs! { "id" => 1 },
        attrs! { "code" => "x" },
        attrs! { "name" => "joe" },
        attrs! { "first" => "Joe", "last" => "Schmoe" },
    ] {
        assert!(hit(&engine, &lookup).is_none());
    }
}

#[test]
fn indexes_and_counters_stay_disjoint() {
    let mut counter_first = ConfigBuilder::new(users());
    counter_first.counters(["points"]).expect("counters");
    assert!(matches!(
        counter_first.index(["points"]),
        Err(CacheError::IndexCounterOverlap { .. })
    ));

    let mut index_first = ConfigBuilder::new(users());
    index_first.index(["points", "code"]).expect("index");
    assert!(matches!(
        index_first.counters(["points"]),
        Err(CacheError::IndexCounterOverlap { .. })
    ));
    // the earlier successful call survives the failed one
    assert_eq!(index_first.indexes().len(), 2);
    assert!(index_first.counter_names().is_empty());
}

#[test]
fn counter_columns_are_not_lookup_keys() {
    let registry = ConfigRegistry::new();
    let engine = engine(&registry);
    assert!(matches!(
        engine.read(&attrs! { "points" => 10 }, ReadOptions::default()),
        Err(CacheError::UnknownIndex { .. })
    ));
}

#[test]
fn skip_counters_returns_snapshot_values() {
    let registry = ConfigRegistry::new();
    let engine = engine(&registry);
    let mut record = saved(&engine, &joe());

    engine.increment(&mut record, "points", 1).expect("increment");
    assert_eq!(record.get("points"), Some(&Value::Integer(1)));

    let stale = engine
        .read(&attrs! { "id" => 1 }, ReadOptions::skip_counters())
        .expect("read")
        .expect("hit");
    assert_eq!(stale.get("points"), Some(&Value::Integer(0)));

    let live = hit(&engine, &attrs! { "id" => 1 }).expect("hit");
    assert_eq!(live.get("points"), Some(&Value::Integer(1)));
}

#[test]
fn find_reads_through_to_the_record_store() {
    let registry = ConfigRegistry::new();
    let engine = engine(&registry);
    let records = MemoryRecordStore::new();

    let mut record = Record::from_attributes(
        engine.config().record_type().clone(),
        &attrs! { "code" => "y", "name" => "ann", "first" => "Ann", "last" => "Lee" },
    )
    .expect("record");
    records.insert(&mut record).expect("insert");

    assert!(hit(&engine, &attrs! { "code" => "y" }).is_none());
    let found = engine
        .find(&attrs! { "code" => "y" }, ReadOptions::default(), &records)
        .expect("find")
        .expect("found in store");
    assert_eq!(found, record);

    // populated for every index, not just the one looked up
    assert!(hit(&engine, &attrs! { "name" => "ann" }).is_some());
    assert!(engine
        .find(&attrs! { "code" => "missing" }, ReadOptions::default(), &records)
        .expect("find")
        .is_none());
}

#[test]
fn collaborator_lifecycle_keeps_cache_in_step() {
    let registry = ConfigRegistry::new();
    let engine = engine(&registry);
    let records = MemoryRecordStore::new();

    let mut record = Record::from_attributes(engine.config().record_type().clone(), &joe())
        .expect("record");
    records.insert(&mut record).expect("insert");
    engine.write(&mut record, None).expect("write after create");

    record.set("code", "z").expect("set code");
    let prior = record.attributes_before_changes();
    records.update(&mut record).expect("update");
    engine
        .write(&mut record, Some(&prior))
        .expect("write after update");
    assert!(hit(&engine, &attrs! { "code" => "x" }).is_none());
    assert!(hit(&engine, &attrs! { "code" => "z" }).is_some());

    let snapshot = record.attributes().clone();
    records.destroy(&record).expect("destroy");
    engine.delete(&record, &snapshot).expect("delete after destroy");
    assert!(engine
        .find(&attrs! { "id" => 1 }, ReadOptions::default(), &records)
        .expect("find")
        .is_none());
}

#[test]
fn write_changes_after_commit_retires_stale_keys() {
    let registry = ConfigRegistry::new();
    let engine = engine(&registry);
    let records = MemoryRecordStore::new();

    let mut record = Record::from_attributes(
        engine.config().record_type().clone(),
        &attrs! { "code" => "x", "name" => "joe" },
    )
    .expect("record");
    records.insert(&mut record).expect("insert");
    engine.write_changes(&mut record).expect("write after create");
    assert!(hit(&engine, &attrs! { "code" => "x" }).is_some());

    record.set("code", "z").expect("set code");
    records.update(&mut record).expect("update");
    engine.write_changes(&mut record).expect("write after update");

    assert!(hit(&engine, &attrs! { "code" => "x" }).is_none());
    let current = hit(&engine, &attrs! { "code" => "z" }).expect("current key");
    assert_eq!(current.get("code"), Some(&Value::from("z")));
    assert!(hit(&engine, &attrs! { "name" => "joe" }).is_some());
}

#[test]
fn key_segments_cannot_contain_separators() {
    let err = RecordType::new(
        "users:points",
        "id",
        [Column::new("id", ColumnType::Integer)],
    )
    .expect_err("type name forging a counter key");
    assert!(matches!(err, DomainError::InvalidRecordType { .. }));

    assert!(matches!(
        KeyCodec::new("RowCache", "v1/prod"),
        Err(CacheError::InvalidKeySegment { .. })
    ));

    let production = KeyCodec::new("RowCache", "v1")
        .and_then(|codec| codec.with_environment("prod"))
        .expect("valid codec");
    let registry = ConfigRegistry::new();
    let config = engine(&registry).config().clone();
    let scoped = CacheSyncEngine::new(Arc::new(MemoryStore::default()), production, config);
    let key = scoped
        .codec()
        .counter_key(scoped.config(), &Value::Integer(1), "points")
        .expect("counter key");
    assert_eq!(key.as_str(), r#"RowCache.v1/prod:users:points:[["id",1]]"#);
}

#[test]
fn provider_ttl_is_resolved_per_write() {
    let registry = ConfigRegistry::new();
    let config = registry
        .configure_with(users(), |c| {
            c.expires_in(Ttl::provider(|| Duration::from_millis(5)));
            Ok(())
        })
        .expect("configure");
    let engine = CacheSyncEngine::new(Arc::new(MemoryStore::default()), KeyCodec::default(), config);

    saved(&engine, &attrs! { "id" => 1 });
    assert!(hit(&engine, &attrs! { "id" => 1 }).is_some());
    std::thread::sleep(Duration::from_millis(20));
    assert!(hit(&engine, &attrs! { "id" => 1 }).is_none());
}

#[test]
fn counters_never_expire_with_snapshots() {
    let registry = ConfigRegistry::new();
    let config = registry
        .configure_with(users(), |c| {
            c.counters(["points"])?;
            c.expires_in(Duration::from_millis(5));
            Ok(())
        })
        .expect("configure");
    let engine = CacheSyncEngine::new(Arc::new(MemoryStore::default()), KeyCodec::default(), config);

    let mut record = saved(&engine, &attrs! { "id" => 1 });
    engine.increment(&mut record, "points", 3).expect("increment");
    std::thread::sleep(Duration::from_millis(20));

    assert!(hit(&engine, &attrs! { "id" => 1 }).is_none());
    assert_eq!(
        engine
            .counters()
            .value(&record, "points")
            .expect("counter value"),
        Some(3)
    );
}
