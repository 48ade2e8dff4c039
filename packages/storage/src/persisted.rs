use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Storage, StorageError};

/// Typed JSON value stored under a single key.
///
/// This is the persistence strategy handed to every store: `load`, `save`
/// and `clear`. A value that no longer parses is discarded and its key
/// removed instead of being reported.
pub struct PersistedValue<T> {
    storage: Arc<dyn Storage>,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for PersistedValue<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for PersistedValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedValue")
            .field("key", &self.key)
            .finish()
    }
}

impl<T: Serialize + DeserializeOwned> PersistedValue<T> {
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the value. Malformed JSON is treated as absent and removed.
    pub fn load(&self) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.storage.get(&self.key)? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                tracing::warn!(key = %self.key, %error, "Discarding malformed persisted value");
                self.storage.remove(&self.key)?;
                Ok(None)
            }
        }
    }

    pub fn save(&self, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.storage.set(&self.key, &raw)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(&self.key)
    }

    /// Save `Some`, clear on `None`.
    pub fn store(&self, value: Option<&T>) -> Result<(), StorageError> {
        match value {
            Some(value) => self.save(value),
            None => self.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStorage;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Org {
        id: String,
        name: String,
    }

    fn storage() -> Arc<dyn Storage> {
        Arc::new(InMemoryStorage::new())
    }

    #[test]
    fn save_then_load() {
        let storage = storage();
        let value: PersistedValue<Org> = PersistedValue::new(storage.clone(), "active_organization");
        let org = Org {
            id: "o1".to_string(),
            name: "Acme".to_string(),
        };

        value.save(&org).unwrap();
        assert_eq!(value.load().unwrap(), Some(org));
        assert_eq!(
            storage.get("active_organization").unwrap().as_deref(),
            Some(r#"{"id":"o1","name":"Acme"}"#)
        );
    }

    #[test]
    fn malformed_json_is_discarded_and_removed() {
        let storage = storage();
        storage.set("active_organization", "{\"id\":").unwrap();

        let value: PersistedValue<Org> = PersistedValue::new(storage.clone(), "active_organization");
        assert_eq!(value.load().unwrap(), None);
        assert_eq!(storage.get("active_organization").unwrap(), None);
    }

    #[test]
    fn wrong_shape_is_discarded_too() {
        let storage = storage();
        storage.set("active_organization", "[1,2,3]").unwrap();

        let value: PersistedValue<Org> = PersistedValue::new(storage.clone(), "active_organization");
        assert_eq!(value.load().unwrap(), None);
        assert_eq!(storage.get("active_organization").unwrap(), None);
    }

    #[test]
    fn store_none_clears() {
        let storage = storage();
        let value: PersistedValue<String> = PersistedValue::new(storage.clone(), "user-lang");
        value.store(Some(&"ar".to_string())).unwrap();
        assert_eq!(value.load().unwrap().as_deref(), Some("ar"));

        value.store(None).unwrap();
        assert_eq!(value.load().unwrap(), None);
        assert_eq!(storage.get("user-lang").unwrap(), None);
    }
}
