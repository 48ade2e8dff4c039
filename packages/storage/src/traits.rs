use std::sync::Arc;

use crate::StorageError;

/// Raw key/value persistence.
///
/// Values are opaque strings (JSON text by convention). Implementations must
/// be safe to share across tasks; every store in the client holds an
/// `Arc<dyn Storage>`.
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`, or `None` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// Blanket implementations for shared and boxed stores

impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

impl<T: Storage + ?Sized> Storage for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.as_ref().get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.as_ref().set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.as_ref().remove(key)
    }
}
