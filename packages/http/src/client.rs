use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;

use otadash_storage::TokenStore;

use crate::config::ClientConfig;
use crate::error::HttpError;
use crate::executor::{HttpExecutor, ReqwestExecutor};
use crate::types::{HttpRequest, HttpResponse, Method};

/// Told when any request comes back `401 Unauthorized`.
///
/// The session store implements this to drop the local session. The token
/// has already been cleared by the time the handler runs.
#[async_trait]
pub trait UnauthorizedHandler: Send + Sync {
    async fn on_unauthorized(&self);
}

struct Inner {
    executor: Arc<dyn HttpExecutor>,
    base_url: String,
    tokens: TokenStore,
    unauthorized: RwLock<Option<Arc<dyn UnauthorizedHandler>>>,
}

/// HTTP client for the dashboard API.
///
/// Cheap to clone; clones share the executor, the token and the
/// unauthorized handler.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    /// Create a client using reqwest with the configured timeout.
    pub fn new(config: &ClientConfig, tokens: TokenStore) -> Result<Self, HttpError> {
        let executor = ReqwestExecutor::new(config.timeout)
            .map_err(|message| HttpError::Transport { message })?;
        Self::with_executor(&config.base_url, Arc::new(executor), tokens)
    }

    /// Create a client over an arbitrary executor.
    pub fn with_executor(
        base_url: &str,
        executor: Arc<dyn HttpExecutor>,
        tokens: TokenStore,
    ) -> Result<Self, HttpError> {
        let parsed = url::Url::parse(base_url)?;
        if parsed.cannot_be_a_base() {
            return Err(HttpError::InvalidUrl {
                message: format!("'{}' cannot be used as a base address", base_url),
            });
        }

        Ok(Self {
            inner: Arc::new(Inner {
                executor,
                base_url: base_url.trim_end_matches('/').to_string(),
                tokens,
                unauthorized: RwLock::new(None),
            }),
        })
    }

    /// Install the handler run after a 401 response.
    pub fn set_unauthorized_handler(&self, handler: Arc<dyn UnauthorizedHandler>) {
        *self.inner.unauthorized.write() = Some(handler);
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    /// Resolve `path` against the base address.
    ///
    /// Paths are appended (`http://host/api` + `/apps` is
    /// `http://host/api/apps`); absolute URLs are used as given.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.is_empty() {
            return self.inner.base_url.clone();
        }
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str) -> Result<HttpResponse, HttpError> {
        self.send(HttpRequest::get(path)).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<HttpResponse, HttpError> {
        self.send(HttpRequest::post(path).with_body(body)?).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<HttpResponse, HttpError> {
        self.send(HttpRequest::put(path).with_body(body)?).await
    }

    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<HttpResponse, HttpError> {
        self.send(HttpRequest::patch(path).with_body(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<HttpResponse, HttpError> {
        self.send(HttpRequest::delete(path)).await
    }

    /// Send `method` to `path` with an optional JSON body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<HttpResponse, HttpError> {
        let mut request = HttpRequest::new(method, path);
        if method.has_body() {
            request.body = body;
        }
        self.send(request).await
    }

    /// Execute a request through the interceptors.
    ///
    /// Adds the JSON content type and the bearer token, then maps the
    /// response: 2xx passes through, anything else becomes
    /// [`HttpError::Status`]. A 401 additionally clears the token and runs
    /// the unauthorized handler before the error is returned.
    pub async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse, HttpError> {
        request.path = self.url(&request.path);
        request
            .headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        if let Some(token) = self.inner.tokens.get() {
            request
                .headers
                .insert("Authorization".to_string(), format!("Bearer {}", token));
        }

        tracing::debug!(method = %request.method, url = %request.path, "Sending request");

        let response = self
            .inner
            .executor
            .execute(&request)
            .await
            .map_err(|message| {
                tracing::debug!(url = %request.path, %message, "Request failed without a response");
                HttpError::Transport { message }
            })?;

        if response.is_success() {
            return Ok(response);
        }

        if response.is_unauthorized() {
            tracing::warn!(url = %request.path, "Unauthorized response, dropping session");
            self.inner.tokens.clear();
            let handler = self.inner.unauthorized.read().clone();
            if let Some(handler) = handler {
                handler.on_unauthorized().await;
            }
        }

        Err(HttpError::Status {
            status: response.status,
            body: response.body,
        })
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .finish()
    }
}
