//! Shared setup for unit tests.

use std::sync::Arc;
use std::time::Duration;

use otadash_http::mock::MockExecutor;
use otadash_http::ApiClient;
use otadash_query::{ErrorNormalizer, QueryClient, QueryDefaults, RecordingNavigator, RetryConfig, RetryPolicy};
use otadash_state::Selection;
use otadash_storage::{keys, InMemoryStorage, Storage, TokenStore};

use crate::models::fixtures;
use crate::scope::ActiveAppStore;

/// A query client over `executor` at `http://mock.local`, retrying
/// without delay.
pub fn client(executor: &MockExecutor) -> QueryClient {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let tokens = TokenStore::new(storage);
    let api = ApiClient::with_executor("http://mock.local", Arc::new(executor.clone()), tokens.clone())
        .unwrap();
    let retry = RetryPolicy::new(
        RetryConfig::default().with_base_delay(Duration::ZERO),
        tokens,
        Arc::new(RecordingNavigator::new()),
    );
    QueryClient::new(api, ErrorNormalizer::silent(), retry, QueryDefaults::default())
}

pub fn no_app() -> ActiveAppStore {
    Selection::load(Arc::new(InMemoryStorage::new()), keys::ACTIVE_APP)
}

/// An active app store with `com.acme.shop` selected.
pub fn shop_app() -> ActiveAppStore {
    let active = no_app();
    active.select(fixtures::app("a1", "com.acme.shop"));
    active
}
