//! Record instances with dirty tracking.

use std::sync::Arc;

use super::attributes::Attributes;
use super::error::DomainError;
use super::schema::{RecordType, normalize_column};
use super::types::Value;

/// One row of a [`RecordType`].
///
/// Besides its current attributes a record remembers the values it had when it
/// was last persisted, so callers can recover the pre-mutation snapshot needed
/// for stale-key invalidation.
#[derive(Debug, Clone)]
pub struct Record {
    record_type: Arc<RecordType>,
    attributes: Attributes,
    persisted_attributes: Attributes,
    previously_persisted: Option<Attributes>,
    persisted: bool,
}

impl Record {
    /// A new, unsaved record populated with column defaults.
    pub fn new(record_type: Arc<RecordType>) -> Self {
        let attributes = record_type.default_attributes();
        Self {
            persisted_attributes: attributes.clone(),
            attributes,
            record_type,
            previously_persisted: None,
            persisted: false,
        }
    }

    /// A new, unsaved record with `attributes` written over the column defaults.
    pub fn from_attributes(
        record_type: Arc<RecordType>,
        attributes: &Attributes,
    ) -> Result<Self, DomainError> {
        let mut record = Self::new(record_type);
        for (name, value) in attributes {
            record.set(name, value.clone())?;
        }
        Ok(record)
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record_type
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Assign one attribute; unknown columns and ill-typed values are rejected.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), DomainError> {
        let name = normalize_column(name);
        let value = value.into();
        let column = self
            .record_type
            .column(&name)
            .ok_or_else(|| DomainError::unknown_attribute(self.record_type.name(), &name))?;
        if !value.conforms_to(column.column_type()) {
            return Err(DomainError::type_mismatch(
                name,
                column.column_type(),
                value.to_string(),
            ));
        }
        self.attributes.insert(name, value);
        Ok(())
    }

    /// Assign a value loaded from a store; it counts as persisted, not as a change.
    pub fn load(&mut self, name: &str, value: impl Into<Value>) -> Result<(), DomainError> {
        self.set(name, value)?;
        let name = normalize_column(name);
        if let Some(value) = self.attributes.get(&name) {
            self.persisted_attributes.insert(name.as_str(), value.clone());
        }
        Ok(())
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn primary_key_value(&self) -> &Value {
        self.attributes
            .get(self.record_type.primary_key())
            .unwrap_or(&Value::Null)
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn is_new_record(&self) -> bool {
        !self.persisted
    }

    /// Names of the columns whose value differs from the last persisted state.
    pub fn changed(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|(name, value)| self.persisted_attributes.get(name) != Some(*value))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        !self.changed().is_empty()
    }

    /// Attribute values as they were before any unpersisted change.
    pub fn attributes_before_changes(&self) -> Attributes {
        self.persisted_attributes.clone()
    }

    /// Attribute values replaced by the most recent save of a stored record.
    ///
    /// `None` until a record that was already persisted is saved again.
    pub fn attributes_before_last_save(&self) -> Option<&Attributes> {
        self.previously_persisted.as_ref()
    }

    /// Record that the current attributes now match the backing store.
    pub fn mark_persisted(&mut self) {
        let previous = std::mem::replace(&mut self.persisted_attributes, self.attributes.clone());
        self.previously_persisted = self.persisted.then_some(previous);
        self.persisted = true;
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.record_type.name() == other.record_type.name() && self.attributes == other.attributes
    }
}
