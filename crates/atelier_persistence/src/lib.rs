//! Persistence boundary for Atelier.
//!
//! This crate provides:
//!
//! - [`Store`]: Key-value/collection store contract: `get`, `put`, `remove`,
//!   `keys`, and an atomic whole-collection `replace_all`.
//!
//! - [`Storable`]: Metadata trait naming the collection a record type lives in
//!   and its schema version.
//!
//! - [`StoreExt`]: Typed save/load helpers over any [`Store`], wrapping records
//!   in a versioned envelope.
//!
//! - [`MemoryStore`]: In-process implementation for tests and single-process use.
//!
//! - [`PersistenceError`]: Error type for persistence operations.
//!
//! Atelier does not prescribe a storage engine. Anything that can honor the
//! [`Store`] contract (a document database, a key-value service, a directory of
//! JSON files) can back conversations and jobs.
//!
//! # Example
//!
//! ```
//! use atelier_persistence::{MemoryStore, Storable, StoreExt};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Note {
//!     text: String,
//! }
//!
//! impl Storable for Note {
//!     fn collection() -> &'static str {
//!         "notes"
//!     }
//! }
//!
//! let store = MemoryStore::new();
//! store.save("n1", &Note { text: "hi".into() }).unwrap();
//! let loaded: Option<Note> = store.load("n1").unwrap();
//! assert_eq!(loaded, Some(Note { text: "hi".into() }));
//! ```

mod memory;

pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata for a record type eligible for persistence.
pub trait Storable: Send + Sync + 'static {
    /// Stable collection name for this record type.
    fn collection() -> &'static str;

    /// Semantic version for the schema. Defaults to `"1.0.0"`.
    fn schema_version() -> &'static str {
        "1.0.0"
    }
}

/// Error type for persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored record was written with an incompatible schema.
    #[error("schema mismatch in '{collection}': stored {stored}, expected {expected}")]
    SchemaMismatch {
        /// Collection holding the record.
        collection: &'static str,
        /// Version found in the stored envelope.
        stored: String,
        /// Version the reader understands.
        expected: &'static str,
    },

    /// The backing store failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Collection-oriented key-value store.
///
/// Implementations must be safe to share between threads. `replace_all` must be
/// atomic: a concurrent `get` or `keys` observes either the previous or the
/// new contents of the collection, never a mixture.
pub trait Store: Send + Sync + 'static {
    /// Reads a value.
    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, PersistenceError>;

    /// Inserts or overwrites a value.
    fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), PersistenceError>;

    /// Removes a value, returning whether it existed.
    fn remove(&self, collection: &str, key: &str) -> Result<bool, PersistenceError>;

    /// Lists the keys of a collection.
    fn keys(&self, collection: &str) -> Result<Vec<String>, PersistenceError>;

    /// Atomically replaces the entire contents of a collection.
    fn replace_all(
        &self,
        collection: &str,
        entries: Vec<(String, Value)>,
    ) -> Result<(), PersistenceError>;
}

/// Versioned wrapper written around every typed record.
#[derive(Serialize, Deserialize)]
struct Envelope {
    schema_version: String,
    data: Value,
}

fn major(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

fn seal<T: Storable + Serialize>(record: &T) -> Result<Value, PersistenceError> {
    let envelope = Envelope {
        schema_version: T::schema_version().to_string(),
        data: serde_json::to_value(record)?,
    };
    Ok(serde_json::to_value(envelope)?)
}

fn open<T: Storable + DeserializeOwned>(value: Value) -> Result<T, PersistenceError> {
    let envelope: Envelope = serde_json::from_value(value)?;
    if major(&envelope.schema_version) != major(T::schema_version()) {
        return Err(PersistenceError::SchemaMismatch {
            collection: T::collection(),
            stored: envelope.schema_version,
            expected: T::schema_version(),
        });
    }
    Ok(serde_json::from_value(envelope.data)?)
}

/// Typed helpers available on every [`Store`].
pub trait StoreExt: Store {
    /// Serializes and stores a record under `key` in its collection.
    fn save<T: Storable + Serialize>(&self, key: &str, record: &T) -> Result<(), PersistenceError> {
        self.put(T::collection(), key, seal(record)?)
    }

    /// Loads a record by key.
    ///
    /// Records whose schema major version differs from [`Storable::schema_version`]
    /// fail with [`PersistenceError::SchemaMismatch`].
    fn load<T: Storable + DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PersistenceError> {
        self.get(T::collection(), key)?.map(open::<T>).transpose()
    }

    /// Loads every record of a collection, in key order.
    fn load_all<T: Storable + DeserializeOwned>(&self) -> Result<Vec<T>, PersistenceError> {
        let mut keys = self.keys(T::collection())?;
        keys.sort();
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            // A key removed between `keys` and `get` is simply skipped.
            if let Some(value) = self.get(T::collection(), &key)? {
                records.push(open::<T>(value)?);
            }
        }
        Ok(records)
    }

    /// Deletes a record by key.
    fn delete<T: Storable>(&self, key: &str) -> Result<bool, PersistenceError> {
        self.remove(T::collection(), key)
    }

    /// Atomically replaces a whole collection with the given records.
    fn replace_collection<'a, T, I>(&self, records: I) -> Result<(), PersistenceError>
    where
        T: Storable + Serialize + 'a,
        I: IntoIterator<Item = (String, &'a T)>,
    {
        let entries = records
            .into_iter()
            .map(|(key, record)| Ok((key, seal(record)?)))
            .collect::<Result<Vec<_>, PersistenceError>>()?;
        self.replace_all(T::collection(), entries)
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Versioned {
        value: u32,
    }

    impl Storable for Versioned {
        fn collection() -> &'static str {
            "versioned"
        }

        fn schema_version() -> &'static str {
            "2.1.0"
        }
    }

    #[test]
    fn save_wraps_record_in_envelope() {
        let store = MemoryStore::new();
        store.save("a", &Versioned { value: 7 }).unwrap();

        let raw = store.get("versioned", "a").unwrap().unwrap();
        assert_eq!(raw["schema_version"], "2.1.0");
        assert_eq!(raw["data"]["value"], 7);
    }

    #[test]
    fn minor_version_difference_still_loads() {
        let store = MemoryStore::new();
        store
            .put(
                "versioned",
                "a",
                serde_json::json!({ "schema_version": "2.0.3", "data": { "value": 1 } }),
            )
            .unwrap();

        let loaded: Option<Versioned> = store.load("a").unwrap();
        assert_eq!(loaded, Some(Versioned { value: 1 }));
    }

    #[test]
    fn major_version_difference_is_rejected() {
        let store = MemoryStore::new();
        store
            .put(
                "versioned",
                "a",
                serde_json::json!({ "schema_version": "1.0.0", "data": { "value": 1 } }),
            )
            .unwrap();

        let result = store.load::<Versioned>("a");
        assert!(matches!(
            result,
            Err(PersistenceError::SchemaMismatch { stored, .. }) if stored == "1.0.0"
        ));
    }

    #[test]
    fn load_all_returns_records_in_key_order() {
        let store = MemoryStore::new();
        store.save("b", &Versioned { value: 2 }).unwrap();
        store.save("a", &Versioned { value: 1 }).unwrap();

        let all: Vec<Versioned> = store.load_all().unwrap();
        assert_eq!(all, vec![Versioned { value: 1 }, Versioned { value: 2 }]);
    }

    #[test]
    fn replace_collection_drops_previous_records() {
        let store = MemoryStore::new();
        store.save("old", &Versioned { value: 0 }).unwrap();

        let fresh = Versioned { value: 9 };
        store
            .replace_collection([("new".to_string(), &fresh)])
            .unwrap();

        assert_eq!(store.load::<Versioned>("old").unwrap(), None);
        assert_eq!(store.load::<Versioned>("new").unwrap(), Some(fresh));
    }
}
