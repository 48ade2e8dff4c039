//! The identity provider boundary.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_confirmed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub user_metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub business_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpType {
    Signup,
    Email,
    Recovery,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: Option<User>,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

pub type AuthCallback = Arc<dyn Fn(AuthEvent, Option<&Session>) + Send + Sync>;

/// Hosted identity service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, IdentityError>;

    /// Create an account. The session usually arrives only after OTP
    /// verification.
    async fn register(&self, registration: &Registration) -> Result<Option<User>, IdentityError>;

    async fn verify_otp(
        &self,
        email: &str,
        token: &str,
        kind: OtpType,
    ) -> Result<AuthResponse, IdentityError>;

    async fn resend_otp(&self, email: &str) -> Result<(), IdentityError>;

    async fn logout(&self) -> Result<(), IdentityError>;

    async fn get_session(&self) -> Result<Option<Session>, IdentityError>;

    async fn get_user(&self) -> Result<Option<User>, IdentityError>;

    /// Register for auth state changes until the subscription is dropped.
    fn on_auth_state_change(&self, callback: AuthCallback) -> Subscription;
}

#[derive(Default)]
struct ListenerList {
    next_id: u64,
    callbacks: Vec<(u64, AuthCallback)>,
}

/// Auth state subscribers of a provider.
#[derive(Clone, Default)]
pub struct AuthListeners {
    list: Arc<Mutex<ListenerList>>,
}

impl AuthListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: AuthCallback) -> Subscription {
        let mut list = self.list.lock();
        list.next_id += 1;
        let id = list.next_id;
        list.callbacks.push((id, callback));
        Subscription {
            id,
            list: Arc::downgrade(&self.list),
        }
    }

    /// Call every subscriber. Callbacks run outside the lock.
    pub fn emit(&self, event: AuthEvent, session: Option<&Session>) {
        let callbacks: Vec<AuthCallback> = self
            .list
            .lock()
            .callbacks
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        tracing::debug!(?event, subscribers = callbacks.len(), "Auth state changed");
        for callback in callbacks {
            callback(event, session);
        }
    }

    pub fn len(&self) -> usize {
        self.list.lock().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to an auth state subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    list: Weak<Mutex<ListenerList>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(list) = self.list.upgrade() {
            list.lock().callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// A scriptable in-process provider for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockState {
        accounts: HashMap<String, String>,
        otp_code: Option<String>,
        session: Option<Session>,
        logout_error: Option<String>,
        calls: Vec<String>,
    }

    #[derive(Clone, Default)]
    pub struct MockIdentityProvider {
        state: Arc<Mutex<MockState>>,
        listeners: AuthListeners,
    }

    impl MockIdentityProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Accept `email` / `password` at login.
        pub fn with_account(self, email: &str, password: &str) -> Self {
            self.state
                .lock()
                .accounts
                .insert(email.to_string(), password.to_string());
            self
        }

        /// The only code `verify_otp` accepts.
        pub fn with_otp(self, code: &str) -> Self {
            self.state.lock().otp_code = Some(code.to_string());
            self
        }

        pub fn with_session(self, session: Session) -> Self {
            self.state.lock().session = Some(session);
            self
        }

        pub fn failing_logout(self, message: &str) -> Self {
            self.state.lock().logout_error = Some(message.to_string());
            self
        }

        /// Names of the provider operations called so far.
        pub fn calls(&self) -> Vec<String> {
            self.state.lock().calls.clone()
        }

        pub fn listeners(&self) -> &AuthListeners {
            &self.listeners
        }

        pub fn emit(&self, event: AuthEvent, session: Option<&Session>) {
            self.listeners.emit(event, session);
        }

        pub fn session_for(email: &str) -> Session {
            Session {
                access_token: format!("token-{}", email),
                refresh_token: format!("refresh-{}", email),
                token_type: Some("bearer".to_string()),
                expires_in: Some(3600),
                expires_at: None,
                user: Some(Self::user_for(email)),
            }
        }

        pub fn user_for(email: &str) -> User {
            User {
                id: format!("user-{}", email),
                email: Some(email.to_string()),
                email_confirmed_at: None,
                created_at: None,
                user_metadata: serde_json::Value::Null,
            }
        }

        fn record(&self, call: &str) {
            self.state.lock().calls.push(call.to_string());
        }

        fn sign_in(&self, email: &str) -> AuthResponse {
            let session = Self::session_for(email);
            self.state.lock().session = Some(session.clone());
            self.listeners.emit(AuthEvent::SignedIn, Some(&session));
            AuthResponse {
                user: session.user.clone(),
                session: Some(session),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for MockIdentityProvider {
        async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, IdentityError> {
            self.record("login");
            let accepted = self.state.lock().accounts.get(&credentials.email) == Some(&credentials.password);
            if !accepted {
                return Err(IdentityError::Rejected {
                    status: Some(400),
                    message: "Invalid login credentials".to_string(),
                });
            }
            Ok(self.sign_in(&credentials.email))
        }

        async fn register(&self, registration: &Registration) -> Result<Option<User>, IdentityError> {
            self.record("register");
            let mut state = self.state.lock();
            if state.accounts.contains_key(&registration.email) {
                return Err(IdentityError::rejected("User already registered"));
            }
            state
                .accounts
                .insert(registration.email.clone(), registration.password.clone());
            Ok(Some(Self::user_for(&registration.email)))
        }

        async fn verify_otp(
            &self,
            email: &str,
            token: &str,
            _kind: OtpType,
        ) -> Result<AuthResponse, IdentityError> {
            self.record("verify_otp");
            let valid = self.state.lock().otp_code.as_deref() == Some(token);
            if !valid {
                return Err(IdentityError::Rejected {
                    status: Some(403),
                    message: "Token has expired or is invalid".to_string(),
                });
            }
            Ok(self.sign_in(email))
        }

        async fn resend_otp(&self, _email: &str) -> Result<(), IdentityError> {
            self.record("resend_otp");
            Ok(())
        }

        async fn logout(&self) -> Result<(), IdentityError> {
            self.record("logout");
            let error = self.state.lock().logout_error.clone();
            if let Some(message) = error {
                return Err(IdentityError::Transport(message));
            }
            self.state.lock().session = None;
            self.listeners.emit(AuthEvent::SignedOut, None);
            Ok(())
        }

        async fn get_session(&self) -> Result<Option<Session>, IdentityError> {
            self.record("get_session");
            Ok(self.state.lock().session.clone())
        }

        async fn get_user(&self) -> Result<Option<User>, IdentityError> {
            self.record("get_user");
            Ok(self.state.lock().session.as_ref().and_then(|s| s.user.clone()))
        }

        fn on_auth_state_change(&self, callback: AuthCallback) -> Subscription {
            self.listeners.subscribe(callback)
        }
    }
}
