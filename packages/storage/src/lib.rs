//! # otadash-storage
//!
//! Durable key/value state for the otadash client.
//!
//! Everything the dashboard remembers between runs lives behind the
//! [`Storage`] trait: the bearer token, the session, the active application
//! and organization, and the display language. Values are JSON strings keyed
//! by a fixed name (see [`keys`]).
//!
//! ## Storage Types
//!
//! - [`InMemoryStorage`]: process-local map, used by tests and ephemeral runs.
//! - [`JsonFileStorage`]: one `<key>.json` file per key under a root directory.
//!
//! ## Typed access
//!
//! [`PersistedValue`] layers serde over a single key. Malformed JSON found on
//! load is treated as absent and the key is removed:
//!
//! ```rust
//! use std::sync::Arc;
//! use otadash_storage::{InMemoryStorage, PersistedValue, Storage};
//!
//! let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
//! storage.set("active_app", "{not json").unwrap();
//!
//! let app: PersistedValue<serde_json::Value> = PersistedValue::new(storage.clone(), "active_app");
//! assert_eq!(app.load().unwrap(), None);
//! assert_eq!(storage.get("active_app").unwrap(), None);
//! ```

pub mod error;
pub mod in_memory;
pub mod keys;
pub mod local_disk;
pub mod persisted;
pub mod token;

mod traits;

pub use error::StorageError;
pub use in_memory::InMemoryStorage;
pub use local_disk::JsonFileStorage;
pub use persisted::PersistedValue;
pub use token::TokenStore;
pub use traits::Storage;
