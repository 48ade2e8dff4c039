//! Session lifecycle.
//!
//! ```text
//! Anonymous ──register──▶ PendingVerification ──verify_otp──▶ Authenticated
//!     │                                                            │
//!     └──────────────────────────login─────────────────────────────┘
//! Authenticated ──logout / SIGNED_OUT / 401──▶ Anonymous
//! ```

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use otadash_http::UnauthorizedHandler;
use otadash_storage::{keys, PersistedValue, Storage, TokenStore};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::identity::{
    AuthEvent, AuthResponse, Credentials, IdentityProvider, OtpType, Registration, Session,
    Subscription, User,
};

/// The part of the session written to the `auth` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedAuth {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub pending_verification_email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Anonymous,
    PendingVerification,
    Authenticated,
}

#[derive(Debug, Default)]
struct SessionState {
    auth: PersistedAuth,
    loading: bool,
    error: Option<String>,
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    tokens: TokenStore,
    persisted: PersistedValue<PersistedAuth>,
    state: RwLock<SessionState>,
    subscription: Mutex<Option<Subscription>>,
}

/// Owns the signed-in user, the session and the pending OTP email.
///
/// Authentication is judged by the presence of the bearer token alone.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

/// Clears the loading flag when an operation ends, however it ends.
struct Loading<'a>(&'a SessionStore);

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.inner.state.write().loading = false;
    }
}

impl SessionStore {
    /// Restore the persisted session from `storage`.
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        storage: Arc<dyn Storage>,
        tokens: TokenStore,
    ) -> Self {
        let persisted = PersistedValue::new(storage, keys::AUTH);
        let auth = match persisted.load() {
            Ok(auth) => auth.unwrap_or_default(),
            Err(error) => {
                tracing::warn!(%error, "Failed to restore session, starting signed out");
                PersistedAuth::default()
            }
        };

        Self {
            inner: Arc::new(Inner {
                provider,
                tokens,
                persisted,
                state: RwLock::new(SessionState {
                    auth,
                    ..SessionState::default()
                }),
                subscription: Mutex::new(None),
            }),
        }
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.inner.provider
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.tokens.is_present()
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_authenticated() {
            SessionStatus::Authenticated
        } else if self.pending_verification_email().is_some() {
            SessionStatus::PendingVerification
        } else {
            SessionStatus::Anonymous
        }
    }

    pub fn user(&self) -> Option<User> {
        self.inner.state.read().auth.user.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.state.read().auth.session.clone()
    }

    pub fn pending_verification_email(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .auth
            .pending_verification_email
            .clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.read().loading
    }

    /// Message of the most recent failed operation.
    pub fn last_error(&self) -> Option<String> {
        self.inner.state.read().error.clone()
    }

    fn begin(&self) -> Loading<'_> {
        let mut state = self.inner.state.write();
        state.loading = true;
        state.error = None;
        Loading(self)
    }

    fn record_error<E: std::fmt::Display>(&self, error: E) -> E {
        self.inner.state.write().error = Some(error.to_string());
        error
    }

    fn update(&self, f: impl FnOnce(&mut PersistedAuth)) {
        let snapshot = {
            let mut state = self.inner.state.write();
            f(&mut state.auth);
            state.auth.clone()
        };
        if let Err(error) = self.inner.persisted.save(&snapshot) {
            tracing::warn!(%error, "Failed to persist session");
        }
    }

    fn establish(&self, user: Option<User>, session: Option<Session>) {
        let user = user.or_else(|| session.as_ref().and_then(|s| s.user.clone()));
        self.inner.tokens.set(
            session
                .as_ref()
                .map(|s| s.access_token.clone())
                .unwrap_or_default(),
        );
        self.update(|auth| {
            auth.user = user;
            auth.session = session;
        });
    }

    /// Sign in with email and password.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), SessionError> {
        let _loading = self.begin();
        tracing::info!(email = %credentials.email, "Signing in");

        let response = self
            .inner
            .provider
            .login(credentials)
            .await
            .map_err(|e| self.record_error(SessionError::from(e)))?;

        let user = match response.user {
            Some(user) => Some(user),
            None => self
                .inner
                .provider
                .get_user()
                .await
                .map_err(|e| self.record_error(SessionError::from(e)))?,
        };
        let session = match response.session {
            Some(session) => Some(session),
            None => self
                .inner
                .provider
                .get_session()
                .await
                .map_err(|e| self.record_error(SessionError::from(e)))?,
        };

        self.establish(user, session);
        Ok(())
    }

    /// Create an account and wait for the emailed code.
    pub async fn register(&self, registration: &Registration) -> Result<Option<User>, SessionError> {
        let _loading = self.begin();
        tracing::info!(email = %registration.email, "Registering");

        let user = self
            .inner
            .provider
            .register(registration)
            .await
            .map_err(|e| self.record_error(SessionError::from(e)))?;

        let email = registration.email.clone();
        let registered = user.clone();
        self.update(|auth| {
            auth.user = registered;
            auth.pending_verification_email = Some(email);
        });
        Ok(user)
    }

    /// Confirm the pending registration with the emailed `code`.
    ///
    /// On failure only the recorded error changes; the pending email is
    /// kept so the user can retry.
    pub async fn verify_otp(&self, code: &str) -> Result<AuthResponse, SessionError> {
        let email = self
            .pending_verification_email()
            .ok_or(SessionError::NoPendingVerification)?;
        let _loading = self.begin();

        let response = self
            .inner
            .provider
            .verify_otp(&email, code, OtpType::Signup)
            .await
            .map_err(|e| self.record_error(SessionError::from(e)))?;

        self.establish(response.user.clone(), response.session.clone());
        self.update(|auth| auth.pending_verification_email = None);
        tracing::info!(%email, "Verification complete");
        Ok(response)
    }

    pub async fn resend_otp(&self) -> Result<(), SessionError> {
        let email = self
            .pending_verification_email()
            .ok_or(SessionError::NoPendingVerification)?;

        self.inner
            .provider
            .resend_otp(&email)
            .await
            .map_err(|e| self.record_error(SessionError::from(e)))
    }

    /// Sign out.
    ///
    /// Local state is cleared before the provider is called, so the store
    /// is signed out even when the provider call fails. That failure is
    /// still recorded and returned.
    pub async fn logout(&self) -> Result<(), SessionError> {
        tracing::info!("Signing out");
        self.clear_local();

        self.inner.provider.logout().await.map_err(|e| {
            tracing::warn!(error = %e, "Remote sign-out failed");
            self.record_error(SessionError::from(e))
        })
    }

    /// Reload the user from the provider.
    pub async fn fetch_profile(&self) -> Result<Option<User>, SessionError> {
        let user = self
            .inner
            .provider
            .get_user()
            .await
            .map_err(|e| self.record_error(SessionError::from(e)))?;
        let fetched = user.clone();
        self.update(|auth| auth.user = fetched);
        Ok(user)
    }

    /// Adopt the provider's current session and follow its auth events.
    pub async fn init(&self) -> Result<(), SessionError> {
        let session = self.inner.provider.get_session().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize auth state");
            self.record_error(SessionError::from(e))
        })?;

        if let Some(token) = session.as_ref().map(|s| s.access_token.clone()) {
            if !token.is_empty() {
                self.inner.tokens.set(token);
            }
        }
        let user = session.as_ref().and_then(|s| s.user.clone());
        self.update(|auth| {
            auth.user = user;
            auth.session = session;
        });

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let subscription = self
            .inner
            .provider
            .on_auth_state_change(Arc::new(move |event, session| {
                if let Some(inner) = weak.upgrade() {
                    SessionStore { inner }.apply_event(event, session);
                }
            }));
        *self.inner.subscription.lock() = Some(subscription);
        Ok(())
    }

    fn apply_event(&self, event: AuthEvent, session: Option<&Session>) {
        tracing::debug!(?event, "Applying auth event");
        if event == AuthEvent::SignedOut {
            self.clear_local();
            return;
        }

        let session = session.cloned();
        self.inner.tokens.set(
            session
                .as_ref()
                .map(|s| s.access_token.clone())
                .unwrap_or_default(),
        );
        let user = session.as_ref().and_then(|s| s.user.clone());
        self.update(|auth| {
            auth.user = user;
            auth.session = session;
        });
    }

    /// Forget the user, the session, the token and the pending email.
    pub fn clear_local(&self) {
        self.inner.tokens.clear();
        self.update(|auth| *auth = PersistedAuth::default());
    }
}

#[async_trait]
impl UnauthorizedHandler for SessionStore {
    async fn on_unauthorized(&self) {
        self.clear_local();
        if let Err(error) = self.inner.provider.logout().await {
            tracing::warn!(%error, "Remote sign-out after 401 failed");
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IdentityError;
    use crate::identity::mock::MockIdentityProvider;
    use otadash_storage::InMemoryStorage;

    const EMAIL: &str = "dev@example.com";

    fn store(provider: MockIdentityProvider) -> (SessionStore, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        let tokens = TokenStore::new(storage.clone());
        (SessionStore::new(Arc::new(provider), storage.clone(), tokens), storage)
    }

    fn registration() -> Registration {
        Registration {
            email: EMAIL.to_string(),
            password: "hunter22".to_string(),
            business_name: "Acme".to_string(),
        }
    }

    #[tokio::test]
    async fn login_establishes_session() {
        let (store, storage) = store(MockIdentityProvider::new().with_account(EMAIL, "pw"));

        store.login(&Credentials::new(EMAIL, "pw")).await.unwrap();

        assert!(store.is_authenticated());
        assert_eq!(store.status(), SessionStatus::Authenticated);
        assert_eq!(store.user().unwrap().email.as_deref(), Some(EMAIL));
        assert_eq!(store.tokens().get(), Some(format!("token-{}", EMAIL)));
        assert!(!store.is_loading());
        assert!(storage.get(keys::AUTH).unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_login_records_error() {
        let (store, _) = store(MockIdentityProvider::new().with_account(EMAIL, "pw"));

        let error = store
            .login(&Credentials::new(EMAIL, "wrong"))
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "Invalid login credentials");
        assert_eq!(store.last_error().as_deref(), Some("Invalid login credentials"));
        assert!(!store.is_authenticated());
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn register_then_wrong_code_keeps_pending_email() {
        let (store, _) = store(MockIdentityProvider::new().with_otp("123456"));

        store.register(&registration()).await.unwrap();
        assert_eq!(store.status(), SessionStatus::PendingVerification);

        let error = store.verify_otp("000000").await.unwrap_err();

        assert!(matches!(error, SessionError::Identity(_)));
        assert!(!store.is_authenticated());
        assert_eq!(store.pending_verification_email().as_deref(), Some(EMAIL));
        assert_eq!(store.status(), SessionStatus::PendingVerification);
    }

    #[tokio::test]
    async fn correct_code_authenticates_and_clears_pending_email() {
        let (store, _) = store(MockIdentityProvider::new().with_otp("123456"));

        store.register(&registration()).await.unwrap();
        store.verify_otp("123456").await.unwrap();

        assert!(store.is_authenticated());
        assert_eq!(store.pending_verification_email(), None);
        assert!(store.session().is_some());
    }

    #[tokio::test]
    async fn otp_operations_require_pending_email() {
        let provider = MockIdentityProvider::new();
        let (store, _) = store(provider.clone());

        assert_eq!(
            store.verify_otp("123456").await.unwrap_err(),
            SessionError::NoPendingVerification
        );
        assert_eq!(
            store.resend_otp().await.unwrap_err(),
            SessionError::NoPendingVerification
        );
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn logout_clears_state_even_when_provider_fails() {
        let provider = MockIdentityProvider::new()
            .with_account(EMAIL, "pw")
            .failing_logout("connection refused");
        let (store, storage) = store(provider);
        store.login(&Credentials::new(EMAIL, "pw")).await.unwrap();

        let error = store.logout().await.unwrap_err();

        assert!(matches!(error, SessionError::Identity(IdentityError::Transport(_))));
        assert!(!store.is_authenticated());
        assert_eq!(store.user(), None);
        assert_eq!(store.session(), None);
        assert_eq!(storage.get(keys::ACCESS_TOKEN).unwrap(), None);
        assert!(store.last_error().is_some());
    }

    #[tokio::test]
    async fn session_survives_restart() {
        let storage = Arc::new(InMemoryStorage::new());
        let provider = Arc::new(MockIdentityProvider::new().with_account(EMAIL, "pw"));
        let first = SessionStore::new(provider.clone(), storage.clone(), TokenStore::new(storage.clone()));
        first.login(&Credentials::new(EMAIL, "pw")).await.unwrap();

        let second = SessionStore::new(provider, storage.clone(), TokenStore::new(storage.clone()));

        assert!(second.is_authenticated());
        assert_eq!(second.user(), first.user());
    }

    #[tokio::test]
    async fn init_adopts_provider_session_and_follows_sign_out() {
        let provider = MockIdentityProvider::new().with_session(MockIdentityProvider::session_for(EMAIL));
        let (store, _) = store(provider.clone());

        store.init().await.unwrap();
        assert!(store.is_authenticated());
        assert_eq!(store.user().unwrap().id, format!("user-{}", EMAIL));

        provider.emit(AuthEvent::SignedOut, None);

        assert!(!store.is_authenticated());
        assert_eq!(store.user(), None);
    }

    #[tokio::test]
    async fn token_refresh_event_replaces_token() {
        let provider = MockIdentityProvider::new();
        let (store, _) = store(provider.clone());
        store.init().await.unwrap();
        assert!(!store.is_authenticated());

        let mut session = MockIdentityProvider::session_for(EMAIL);
        session.access_token = "refreshed".to_string();
        provider.emit(AuthEvent::TokenRefreshed, Some(&session));

        assert_eq!(store.tokens().get().as_deref(), Some("refreshed"));
    }

    #[tokio::test]
    async fn unauthorized_handler_signs_out() {
        let provider = MockIdentityProvider::new().with_account(EMAIL, "pw");
        let (store, _) = store(provider.clone());
        store.login(&Credentials::new(EMAIL, "pw")).await.unwrap();

        store.on_unauthorized().await;

        assert!(!store.is_authenticated());
        assert!(provider.calls().contains(&"logout".to_string()));
    }

    #[tokio::test]
    async fn fetch_profile_refreshes_user() {
        let provider = MockIdentityProvider::new().with_session(MockIdentityProvider::session_for(EMAIL));
        let (store, _) = store(provider);

        let user = store.fetch_profile().await.unwrap();

        assert_eq!(user, store.user());
        assert!(user.is_some());
    }
}
