use std::sync::Arc;

use parking_lot::RwLock;

use crate::{keys, PersistedValue, Storage};

/// The bearer token, held in memory and written through to storage.
///
/// Cloning shares the same token. Only the session store and the
/// unauthorized-response paths mutate it; every request reads it.
/// Storage failures are logged rather than returned, since the in-memory
/// value stays authoritative for the running process.
#[derive(Clone)]
pub struct TokenStore {
    persisted: PersistedValue<String>,
    current: Arc<RwLock<Option<String>>>,
}

impl TokenStore {
    /// Open the token stored under [`keys::ACCESS_TOKEN`].
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let persisted: PersistedValue<String> = PersistedValue::new(storage, keys::ACCESS_TOKEN);
        let current = match persisted.load() {
            Ok(Some(token)) if token.is_empty() => {
                if let Err(error) = persisted.clear() {
                    tracing::warn!(%error, "Failed to remove empty access token");
                }
                None
            }
            Ok(token) => token,
            Err(error) => {
                tracing::warn!(%error, "Failed to load access token");
                None
            }
        };

        Self {
            persisted,
            current: Arc::new(RwLock::new(current)),
        }
    }

    pub fn get(&self) -> Option<String> {
        self.current.read().clone()
    }

    pub fn is_present(&self) -> bool {
        self.current.read().is_some()
    }

    /// Replace the token. An empty token clears it.
    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        if token.is_empty() {
            self.clear();
            return;
        }

        *self.current.write() = Some(token.clone());
        if let Err(error) = self.persisted.save(&token) {
            tracing::warn!(%error, "Failed to persist access token");
        }
    }

    /// Drop the token. Does nothing when no token is held, so the several
    /// 401 paths remove the stored key once between them.
    pub fn clear(&self) {
        if self.current.write().take().is_none() {
            return;
        }
        if let Err(error) = self.persisted.clear() {
            tracing::warn!(%error, "Failed to remove persisted access token");
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("present", &self.is_present())
            .finish()
    }
}
