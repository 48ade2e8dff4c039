//! [`IdentityProvider`] over the hosted auth REST API (`/auth/v1`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use otadash_http::{HttpExecutor, HttpRequest, HttpResponse, ReqwestExecutor};
use parking_lot::RwLock;
use serde_json::{json, Value};

use crate::error::IdentityError;
use crate::identity::{
    AuthCallback, AuthEvent, AuthListeners, AuthResponse, Credentials, IdentityProvider, OtpType,
    Registration, Session, Subscription, User,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoTrueConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public anonymous key sent as `apikey`.
    pub anon_key: String,
    pub timeout: Duration,
}

impl GoTrueConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url.trim_end_matches('/'), path)
    }
}

pub struct GoTrueProvider {
    config: GoTrueConfig,
    executor: Arc<dyn HttpExecutor>,
    session: RwLock<Option<Session>>,
    listeners: AuthListeners,
}

impl GoTrueProvider {
    pub fn new(config: GoTrueConfig) -> Result<Self, IdentityError> {
        let executor = ReqwestExecutor::new(config.timeout).map_err(IdentityError::Transport)?;
        Ok(Self::with_executor(config, Arc::new(executor)))
    }

    pub fn with_executor(config: GoTrueConfig, executor: Arc<dyn HttpExecutor>) -> Self {
        Self {
            config,
            executor,
            session: RwLock::new(None),
            listeners: AuthListeners::new(),
        }
    }

    /// Resume a session saved by an earlier run.
    pub fn with_session(self, session: Option<Session>) -> Self {
        *self.session.write() = session;
        self
    }

    fn access_token(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.access_token.clone())
    }

    async fn call(
        &self,
        request: HttpRequest,
        bearer: Option<String>,
    ) -> Result<HttpResponse, IdentityError> {
        let bearer = bearer.unwrap_or_else(|| self.config.anon_key.clone());
        let request = HttpRequest {
            path: self.config.endpoint(&request.path),
            ..request
        }
        .with_header("apikey", self.config.anon_key.clone())
        .with_header("Authorization", format!("Bearer {}", bearer))
        .with_header("Content-Type", "application/json");

        tracing::debug!(method = %request.method, url = %request.path, "Identity request");
        let response = self
            .executor
            .execute(&request)
            .await
            .map_err(IdentityError::Transport)?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(IdentityError::Rejected {
                status: Some(response.status),
                message: error_message(&response),
            })
        }
    }

    fn adopt(&self, session: Session) -> AuthResponse {
        *self.session.write() = Some(session.clone());
        self.listeners.emit(AuthEvent::SignedIn, Some(&session));
        AuthResponse {
            user: session.user.clone(),
            session: Some(session),
        }
    }
}

fn error_message(response: &HttpResponse) -> String {
    ["error_description", "msg", "message", "error"]
        .iter()
        .filter_map(|field| response.body.get(field).and_then(Value::as_str))
        .find(|text| !text.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed with status code {}", response.status))
}

/// Signup answers with a bare user, or `{user, session}` when confirmation
/// is disabled.
fn parse_signup(body: Value) -> Result<(Option<User>, Option<Session>), IdentityError> {
    if body.get("access_token").is_some() {
        let session: Session = serde_json::from_value(body)?;
        return Ok((session.user.clone(), Some(session)));
    }
    if let Some(user) = body.get("user") {
        let user: Option<User> = serde_json::from_value(user.clone())?;
        let session: Option<Session> = match body.get("session") {
            Some(session) => serde_json::from_value(session.clone())?,
            None => None,
        };
        return Ok((user, session));
    }
    if body.get("id").is_some() {
        return Ok((Some(serde_json::from_value(body)?), None));
    }
    Ok((None, None))
}

#[async_trait]
impl IdentityProvider for GoTrueProvider {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, IdentityError> {
        let request = HttpRequest::post("token?grant_type=password").with_json_body(json!({
            "email": credentials.email,
            "password": credentials.password,
        }));
        let session: Session = self.call(request, None).await?.decode()?;
        Ok(self.adopt(session))
    }

    async fn register(&self, registration: &Registration) -> Result<Option<User>, IdentityError> {
        let request = HttpRequest::post("signup").with_json_body(json!({
            "email": registration.email,
            "password": registration.password,
            "data": { "business_name": registration.business_name },
        }));
        let response = self.call(request, None).await?;
        let (user, session) = parse_signup(response.body)?;
        if let Some(session) = session {
            self.adopt(session);
        }
        Ok(user)
    }

    async fn verify_otp(
        &self,
        email: &str,
        token: &str,
        kind: OtpType,
    ) -> Result<AuthResponse, IdentityError> {
        let request = HttpRequest::post("verify").with_json_body(json!({
            "type": kind,
            "email": email,
            "token": token,
        }));
        let session: Session = self.call(request, None).await?.decode()?;
        Ok(self.adopt(session))
    }

    async fn resend_otp(&self, email: &str) -> Result<(), IdentityError> {
        let request = HttpRequest::post("resend").with_json_body(json!({
            "type": OtpType::Signup,
            "email": email,
        }));
        self.call(request, None).await?;
        Ok(())
    }

    async fn logout(&self) -> Result<(), IdentityError> {
        let token = self.access_token();
        // Nothing to revoke remotely without a session.
        let result = match token {
            Some(token) => self
                .call(HttpRequest::post("logout"), Some(token))
                .await
                .map(|_| ()),
            None => Ok(()),
        };
        *self.session.write() = None;
        self.listeners.emit(AuthEvent::SignedOut, None);
        result
    }

    async fn get_session(&self) -> Result<Option<Session>, IdentityError> {
        Ok(self.session.read().clone())
    }

    async fn get_user(&self) -> Result<Option<User>, IdentityError> {
        let Some(token) = self.access_token() else {
            return Ok(None);
        };
        let user: User = self.call(HttpRequest::get("user"), Some(token)).await?.decode()?;
        if let Some(session) = self.session.write().as_mut() {
            session.user = Some(user.clone());
        }
        Ok(Some(user))
    }

    fn on_auth_state_change(&self, callback: AuthCallback) -> Subscription {
        self.listeners.subscribe(callback)
    }
}

impl std::fmt::Debug for GoTrueProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoTrueProvider")
            .field("url", &self.config.url)
            .field("signed_in", &self.session.read().is_some())
            .finish()
    }
}
