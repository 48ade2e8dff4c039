//! In-memory storage.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::{Storage, StorageError};

/// A process-local [`Storage`] backed by a sorted map.
///
/// # Example
///
/// ```rust
/// use otadash_storage::{InMemoryStorage, Storage};
///
/// let storage = InMemoryStorage::new();
/// storage.set("user-lang", "\"fr\"").unwrap();
/// assert_eq!(storage.get("user-lang").unwrap().as_deref(), Some("\"fr\""));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: RwLock<BTreeMap<String, String>>,
}

impl InMemoryStorage {
    /// Create a new empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage with initial entries.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Keys currently present, in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

impl Storage for InMemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.get("a").unwrap(), None);

        storage.set("a", "1").unwrap();
        assert_eq!(storage.get("a").unwrap(), Some("1".to_string()));

        storage.set("a", "2").unwrap();
        assert_eq!(storage.get("a").unwrap(), Some("2".to_string()));

        storage.remove("a").unwrap();
        assert_eq!(storage.get("a").unwrap(), None);
    }

    #[test]
    fn remove_absent_key_is_ok() {
        let storage = InMemoryStorage::new();
        assert!(storage.remove("missing").is_ok());
    }

    #[test]
    fn with_entries_seeds_values() {
        let storage = InMemoryStorage::with_entries([("b", "2"), ("a", "1")]);
        assert_eq!(storage.keys(), vec!["a".to_string(), "b".to_string()]);
    }
}
