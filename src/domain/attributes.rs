//! Attribute maps keyed by normalized column name.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Deserializer, Serialize};

use super::schema::normalize_column;
use super::types::Value;

/// Column name → value map.
///
/// Names are normalized on insertion and kept sorted, so two maps built from
/// the same pairs in any order compare (and serialize) identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(normalize_column(name.as_ref()), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Keep only the named columns; names without a value are skipped.
    pub fn select<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> Attributes {
        let mut selected = Attributes::new();
        for column in columns {
            if let Some(value) = self.0.get(column) {
                selected.0.insert(column.to_string(), value.clone());
            }
        }
        selected
    }

    /// Copy of `self` with every entry of `other` written over it.
    pub fn overlay(&self, other: &Attributes) -> Attributes {
        let mut merged = self.clone();
        for (name, value) in &other.0 {
            merged.0.insert(name.clone(), value.clone());
        }
        merged
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: AsRef<str>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (name, value) in iter {
            attributes.insert(name, value);
        }
        attributes
    }
}

impl<'de> Deserialize<'de> for Attributes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BTreeMap::<String, Value>::deserialize(deserializer).map(|map| map.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build [`Attributes`] from `name => value` pairs.
///
/// ```
/// use rowcache::{attrs, domain::Value};
///
/// let attributes = attrs! { "code" => "x", "points" => 3 };
/// assert_eq!(attributes.get("points"), Some(&Value::Integer(3)));
/// ```
#[macro_export]
macro_rules! attrs {
    () => {
        $crate::domain::Attributes::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut attributes = $crate::domain::Attributes::new();
        $(attributes.insert($name, $value);)+
        attributes
    }};
}
