//! Cache key derivation.
//!
//! A key is `<namespace>.<version>[/<environment>]:<type>[:<counter>]:<pairs>`
//! where `<pairs>` is the JSON array of `[column, value]` pairs of one index,
//! sorted by column name.

use std::fmt;

use serde::Serialize;

use crate::domain::{Attributes, Value, contains_key_separator, normalize_column};

use super::config::{CacheConfig, IndexDefinition};
use super::error::CacheError;

pub const DEFAULT_NAMESPACE: &str = "RowCache";
pub const DEFAULT_VERSION: &str = "v1";

/// A derived cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Deterministic mapping from (type, index, attribute values) to a [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    namespace: String,
    version: String,
    environment: Option<String>,
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            version: DEFAULT_VERSION.to_string(),
            environment: None,
        }
    }
}

impl TryFrom<&crate::config::KeySettings> for KeyCodec {
    type Error = CacheError;

    fn try_from(settings: &crate::config::KeySettings) -> Result<Self, Self::Error> {
        let codec = Self::new(&settings.namespace, &settings.version)?;
        match settings.environment.as_deref() {
            Some(environment) => codec.with_environment(environment),
            None => Ok(codec),
        }
    }
}

impl KeyCodec {
    /// Fails with [`CacheError::InvalidKeySegment`] when a segment holds a key separator.
    pub fn new(namespace: &str, version: &str) -> Result<Self, CacheError> {
        Ok(Self {
            namespace: key_segment("namespace", namespace)?,
            version: key_segment("version", version)?,
            environment: None,
        })
    }

    /// Separate keys of deployments that share one cache store.
    pub fn with_environment(mut self, environment: &str) -> Result<Self, CacheError> {
        self.environment = Some(key_segment("environment", environment)?);
        Ok(self)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    /// Derive the key of `index` evaluated against `attrs`.
    ///
    /// `attrs` must hold a value for every index column; other attributes are
    /// ignored. Fails with [`CacheError::UnknownIndex`] when `index` is not
    /// registered for the type and with [`CacheError::UnknownCounter`] when
    /// `counter` is not a registered counter.
    pub fn derive_key(
        &self,
        config: &CacheConfig,
        index: &IndexDefinition,
        attrs: &Attributes,
        counter: Option<&str>,
    ) -> Result<CacheKey, CacheError> {
        if !config.has_index(index) {
            return Err(CacheError::unknown_index(
                config.type_name(),
                index.columns().to_vec(),
            ));
        }

        let mut pairs: Vec<(&str, &Value)> = Vec::with_capacity(index.columns().len());
        for column in index.iter() {
            let value = attrs.get(column).ok_or_else(|| {
                CacheError::unknown_index(
                    config.type_name(),
                    attrs.names().map(String::from).collect(),
                )
            })?;
            pairs.push((column, value));
        }

        self.encode(config, &pairs, counter)
    }

    /// Derive the key for a lookup by exactly the columns present in `attrs`.
    pub fn lookup_key(
        &self,
        config: &CacheConfig,
        attrs: &Attributes,
        counter: Option<&str>,
    ) -> Result<CacheKey, CacheError> {
        let index = IndexDefinition::new(attrs.names());
        self.derive_key(config, &index, attrs, counter)
    }

    /// Dedicated key of `counter` for the record whose primary key is `primary_key`.
    pub fn counter_key(
        &self,
        config: &CacheConfig,
        primary_key: &Value,
        counter: &str,
    ) -> Result<CacheKey, CacheError> {
        let pairs = [(config.record_type().primary_key(), primary_key)];
        self.encode(config, &pairs, Some(counter))
    }

    fn encode(
        &self,
        config: &CacheConfig,
        pairs: &[(&str, &Value)],
        counter: Option<&str>,
    ) -> Result<CacheKey, CacheError> {
        let mut key = format!("{}.{}", self.namespace, self.version);
        if let Some(environment) = &self.environment {
            key.push('/');
            key.push_str(environment);
        }
        key.push(':');
        key.push_str(config.type_name());

        if let Some(counter) = counter {
            let counter = normalize_column(counter);
            if !config.has_counter(&counter) {
                return Err(CacheError::unknown_counter(config.type_name(), counter));
            }
            key.push(':');
            key.push_str(&counter);
        }

        key.push(':');
        key.push_str(&encode_pairs(pairs)?);
        Ok(CacheKey(key))
    }
}

fn key_segment(segment: &'static str, value: &str) -> Result<String, CacheError> {
    if contains_key_separator(value) {
        return Err(CacheError::invalid_key_segment(segment, value));
    }
    Ok(value.to_string())
}

fn encode_pairs(pairs: &[(&str, &Value)]) -> Result<String, CacheError> {
    #[derive(Serialize)]
    struct Pair<'a>(&'a str, &'a Value);

    let pairs: Vec<Pair<'_>> = pairs.iter().map(|(name, value)| Pair(name, value)).collect();
    serde_json::to_string(&pairs).map_err(CacheError::KeyEncoding)
}
