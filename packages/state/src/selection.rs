//! Persisted single-value selections (active app, active organization).

use std::sync::Arc;

use otadash_storage::{PersistedValue, Storage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;

struct Inner<T> {
    persisted: PersistedValue<T>,
    current: watch::Sender<Option<T>>,
}

/// One optional value, mirrored to a storage key.
///
/// A stored value that no longer parses is dropped on load and its key
/// removed. Clones share the same value; [`subscribe`](Selection::subscribe)
/// observes changes.
pub struct Selection<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Selection<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    pub fn load(storage: Arc<dyn Storage>, key: &str) -> Self {
        let persisted = PersistedValue::new(storage, key);
        let initial = match persisted.load() {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(key, %error, "Failed to load selection");
                None
            }
        };
        let (current, _) = watch::channel(initial);
        Self {
            inner: Arc::new(Inner { persisted, current }),
        }
    }

    pub fn key(&self) -> &str {
        self.inner.persisted.key()
    }

    pub fn get(&self) -> Option<T> {
        self.inner.current.borrow().clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.inner.current.borrow().as_ref())
    }

    pub fn is_selected(&self) -> bool {
        self.inner.current.borrow().is_some()
    }

    /// Replace the selection. `None` clears it and removes the key.
    pub fn set(&self, value: Option<T>) {
        if let Err(error) = self.inner.persisted.store(value.as_ref()) {
            tracing::warn!(key = self.key(), %error, "Failed to persist selection");
        }
        tracing::debug!(key = self.key(), selected = value.is_some(), "Selection changed");
        self.inner.current.send_replace(value);
    }

    pub fn select(&self, value: T) {
        self.set(Some(value));
    }

    pub fn clear(&self) {
        self.set(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.inner.current.subscribe()
    }
}

impl<T> Clone for Selection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: std::fmt::Debug + Serialize + DeserializeOwned> std::fmt::Debug for Selection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("key", &self.inner.persisted.key())
            .field("value", &*self.inner.current.borrow())
            .finish()
    }
}
