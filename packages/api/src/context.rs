//! The dashboard context: every store a screen or command needs.

use std::sync::Arc;

use otadash_http::{ApiClient, ClientConfig, HttpError};
use otadash_query::{
    ErrorNormalizer, Navigator, QueryClient, QueryDefaults, RetryConfig, RetryPolicy, ToastQueue,
};
use otadash_state::{IdentityProvider, LanguageStore, Selection, SessionError, SessionStore};
use otadash_storage::{keys, Storage, TokenStore};

use crate::models::{App, Organization};
use crate::scope::{ActiveAppStore, ActiveOrganizationStore};

#[derive(Debug, Clone, Default)]
pub struct DashboardConfig {
    pub client: ClientConfig,
    pub retry: RetryConfig,
    pub queries: QueryDefaults,
}

/// Handles to the shared client state.
///
/// One token, one session and one selection of each kind exist per
/// `Dashboard`; clones share them. A 401 from any request clears the
/// session and sends the navigator to the login route.
#[derive(Clone)]
pub struct Dashboard {
    pub queries: QueryClient,
    pub session: SessionStore,
    pub active_app: ActiveAppStore,
    pub active_organization: ActiveOrganizationStore,
    pub language: LanguageStore,
    pub toasts: ToastQueue,
}

impl Dashboard {
    /// Build the context over a reqwest-backed client.
    pub fn open(
        config: &DashboardConfig,
        storage: Arc<dyn Storage>,
        provider: Arc<dyn IdentityProvider>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, HttpError> {
        let api = ApiClient::new(&config.client, TokenStore::new(storage.clone()))?;
        Ok(Self::with_api(api, config, storage, provider, navigator))
    }

    /// Build the context over an existing client, e.g. one with a mock
    /// executor. The client's token store must live in `storage`.
    pub fn with_api(
        api: ApiClient,
        config: &DashboardConfig,
        storage: Arc<dyn Storage>,
        provider: Arc<dyn IdentityProvider>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let tokens = api.tokens().clone();
        let session = SessionStore::new(provider, storage.clone(), tokens.clone());
        api.set_unauthorized_handler(Arc::new(session.clone()));

        let toasts = ToastQueue::new();
        let retry = RetryPolicy::new(config.retry.clone(), tokens, navigator);
        let queries = QueryClient::new(
            api,
            ErrorNormalizer::new(Arc::new(toasts.clone())),
            retry,
            config.queries.clone(),
        );

        Self {
            queries,
            session,
            active_app: Selection::load(storage.clone(), keys::ACTIVE_APP),
            active_organization: Selection::load(storage.clone(), keys::ACTIVE_ORGANIZATION),
            language: LanguageStore::new(storage),
            toasts,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn select_app(&self, app: Option<App>) {
        self.active_app.set(app);
    }

    pub fn select_organization(&self, organization: Option<Organization>) {
        self.active_organization.set(organization);
    }

    /// Sign out and drop every cached response.
    ///
    /// Selections survive so the next sign-in lands on the same app.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let result = self.session.logout().await;
        let cached = self.queries.cached_queries();
        self.queries.clear();
        tracing::debug!(cached, "Dropped cached responses after sign-out");
        result
    }
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("queries", &self.queries)
            .field("session", &self.session)
            .field("active_app", &self.active_app)
            .field("language", &self.language)
            .finish()
    }
}
