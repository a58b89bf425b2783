//! In-process system of record used by the command-line tool and tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::application::repos::{RecordStore, RepoError};
use crate::cache::lock::{rw_read, rw_write};
use crate::domain::{Attributes, ColumnType, Record, RecordType, Value};

const SOURCE: &str = "infra::memory_repo";

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Attributes>,
    last_id: i64,
}

impl Table {
    fn position(&self, primary_key: &str, value: &Value) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.get(primary_key) == Some(value))
    }
}

/// Rows of every record type, kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a new record, assigning the next integer primary key when it has none.
    pub fn insert(&self, record: &mut Record) -> Result<(), RepoError> {
        let record_type = record.record_type().clone();
        let primary_key = record_type.primary_key();
        let mut tables = rw_write(&self.tables, SOURCE, "insert");
        let table = tables.entry(record_type.name().to_string()).or_default();

        match record.primary_key_value().clone() {
            Value::Null => {
                if !is_integer_key(&record_type) {
                    return Err(RepoError::invalid_input(format!(
                        "`{}` needs an explicit primary key",
                        record_type.name()
                    )));
                }
                table.last_id += 1;
                record.set(primary_key, table.last_id)?;
            }
            Value::Integer(id) => {
                if table.position(primary_key, &Value::Integer(id)).is_some() {
                    return Err(duplicate(&record_type));
                }
                table.last_id = table.last_id.max(id);
            }
            value => {
                if table.position(primary_key, &value).is_some() {
                    return Err(duplicate(&record_type));
                }
            }
        }

        table.rows.push(record.attributes().clone());
        record.mark_persisted();
        debug!(
            record_type = record_type.name(),
            primary_key = %record.primary_key_value(),
            "Inserted record"
        );
        Ok(())
    }

    /// Persist the changes of a stored record; the row is located by its
    /// persisted primary key, so primary key changes are allowed.
    pub fn update(&self, record: &mut Record) -> Result<(), RepoError> {
        let record_type = record.record_type().clone();
        let primary_key = record_type.primary_key();
        let persisted = record.attributes_before_changes();
        let persisted_key = persisted.get(primary_key).cloned().unwrap_or_default();

        let mut tables = rw_write(&self.tables, SOURCE, "update");
        let table = tables
            .get_mut(record_type.name())
            .ok_or(RepoError::NotFound)?;
        let position = table
            .position(primary_key, &persisted_key)
            .ok_or(RepoError::NotFound)?;

        let current_key = record.primary_key_value();
        if *current_key != persisted_key && table.position(primary_key, current_key).is_some() {
            return Err(duplicate(&record_type));
        }

        table.rows[position] = record.attributes().clone();
        record.mark_persisted();
        Ok(())
    }

    /// Remove a stored record by its persisted primary key.
    pub fn destroy(&self, record: &Record) -> Result<(), RepoError> {
        let record_type = record.record_type();
        let primary_key = record_type.primary_key();
        let persisted = record.attributes_before_changes();
        let persisted_key = persisted.get(primary_key).cloned().unwrap_or_default();

        let mut tables = rw_write(&self.tables, SOURCE, "destroy");
        let table = tables
            .get_mut(record_type.name())
            .ok_or(RepoError::NotFound)?;
        let position = table
            .position(primary_key, &persisted_key)
            .ok_or(RepoError::NotFound)?;
        table.rows.remove(position);
        Ok(())
    }

    /// Number of stored rows of `type_name`.
    pub fn len(&self, type_name: &str) -> usize {
        rw_read(&self.tables, SOURCE, "len")
            .get(type_name)
            .map_or(0, |table| table.rows.len())
    }

    pub fn is_empty(&self, type_name: &str) -> bool {
        self.len(type_name) == 0
    }
}

impl RecordStore for MemoryRecordStore {
    fn find_one(
        &self,
        record_type: &Arc<RecordType>,
        attrs: &Attributes,
    ) -> Result<Option<Record>, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "find_one");
        let Some(table) = tables.get(record_type.name()) else {
            return Ok(None);
        };
        let Some(row) = table
            .rows
            .iter()
            .find(|row| attrs.iter().all(|(name, value)| row.get(name) == Some(value)))
        else {
            return Ok(None);
        };

        let mut record = Record::from_attributes(record_type.clone(), row)?;
        record.mark_persisted();
        Ok(Some(record))
    }
}

fn is_integer_key(record_type: &RecordType) -> bool {
    record_type
        .column(record_type.primary_key())
        .is_some_and(|column| column.column_type() == ColumnType::Integer)
}

fn duplicate(record_type: &RecordType) -> RepoError {
    RepoError::Duplicate {
        constraint: format!("{}.{}", record_type.name(), record_type.primary_key()),
    }
}
