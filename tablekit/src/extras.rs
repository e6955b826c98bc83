//! Extension bags.
//!
//! Plugins contribute fields to cells, rows, the table `config` and the table
//! `extensions` through [`Extras`]. A bag is an ordered key/value map; merging
//! two bags overwrites by key. Plugins publish typed [`Key`] constants so that
//! readers get values back with the type the plugin wrote.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A named, typed slot inside an [`Extras`] bag.
pub struct Key<V> {
    name: &'static str,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Key<V> {
    /// Declare a key. Intended for `pub const` items.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The key's name inside the bag.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<V> Clone for Key<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Key<V> {}

impl<V> fmt::Debug for Key<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.name).finish()
    }
}

/// Ordered key/value bag contributed by plugins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extras {
    values: Map<String, Value>,
}

impl Extras {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Chainable insert.
    pub fn with<V>(mut self, key: Key<V>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a typed value, replacing any previous one.
    pub fn insert<V>(&mut self, key: Key<V>, value: impl Into<Value>) {
        self.values.insert(key.name.to_string(), value.into());
    }

    /// Insert an untyped value.
    pub fn insert_raw(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Read a typed value. Returns `None` if the key is absent or holds a
    /// value of another shape.
    pub fn get<V: DeserializeOwned>(&self, key: Key<V>) -> Option<V> {
        self.values
            .get(key.name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Read a typed value, falling back to `V::default()`.
    pub fn get_or_default<V: DeserializeOwned + Default>(&self, key: Key<V>) -> V {
        self.get(key).unwrap_or_default()
    }

    /// Read the raw value stored under `name`.
    pub fn get_raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Check whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Remove `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Overwrite-by-key merge of `other` into `self`.
    pub fn merge(&mut self, other: Extras) {
        for (name, value) in other.values {
            self.values.insert(name, value);
        }
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Borrow the underlying JSON map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl From<Map<String, Value>> for Extras {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl From<Extras> for Value {
    fn from(extras: Extras) -> Self {
        Value::Object(extras.values)
    }
}
