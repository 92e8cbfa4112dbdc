//! In-memory [`Store`] implementation.

use crate::{PersistenceError, Store};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

type Collection = BTreeMap<String, Value>;

/// Thread-safe in-process store.
///
/// All collections live behind a single lock, so `replace_all` is trivially
/// atomic with respect to readers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records in a collection.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Returns `true` if a collection holds no records.
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

impl Store for MemoryStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, PersistenceError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|records| records.get(key))
            .cloned())
    }

    fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), PersistenceError> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, collection: &str, key: &str) -> Result<bool, PersistenceError> {
        Ok(self
            .collections
            .write()
            .get_mut(collection)
            .is_some_and(|records| records.remove(key).is_some()))
    }

    fn keys(&self, collection: &str) -> Result<Vec<String>, PersistenceError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn replace_all(
        &self,
        collection: &str,
        entries: Vec<(String, Value)>,
    ) -> Result<(), PersistenceError> {
        let fresh: Collection = entries.into_iter().collect();
        tracing::debug!(collection, records = fresh.len(), "replacing collection");
        self.collections
            .write()
            .insert(collection.to_string(), fresh);
        Ok(())
    }
}
