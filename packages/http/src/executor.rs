//! HTTP execution abstraction.
//!
//! [`ApiClient`](crate::ApiClient) hands fully resolved requests to an
//! [`HttpExecutor`]. Production code uses [`ReqwestExecutor`]; tests swap in
//! [`mock::MockExecutor`] to avoid network calls.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;

use crate::config::DEFAULT_TIMEOUT;
use crate::types::{HttpRequest, HttpResponse};

/// Trait for executing HTTP requests.
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status, and `Err` with a message only when no response was
/// received at all.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String>;
}

/// Production HTTP executor using reqwest.
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    /// Create a new executor with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| e.to_string())?;

        Ok(Self { client })
    }

    /// Create with default timeout of 30 seconds.
    pub fn with_default_timeout() -> Result<Self, String> {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let method: http::Method = request.method.into();

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name = HeaderName::try_from(name.as_str()).map_err(|e| e.to_string())?;
            let header_value = HeaderValue::try_from(value.as_str()).map_err(|e| e.to_string())?;
            headers.insert(header_name, header_value);
        }

        let mut req_builder = self.client.request(method, &request.path);
        req_builder = req_builder.headers(headers);

        if let Some(body) = &request.body {
            req_builder = req_builder.json(body);
        }

        let response = req_builder.send().await.map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string();

        let mut resp_headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                resp_headers.insert(name.to_string(), v.to_string());
            }
        }

        let body_text = response.text().await.map_err(|e| e.to_string())?;
        let body = serde_json::from_str(&body_text).unwrap_or(serde_json::Value::Null);

        Ok(HttpResponse {
            status,
            status_text,
            headers: resp_headers,
            body,
            body_text: Some(body_text),
        })
    }
}

/// Mock HTTP executor for testing.
///
/// Replies are keyed by route: the request URL's path plus its query
/// string, so `http://mock.local/dashboard/devices?app_id=a` matches the
/// route `/dashboard/devices?app_id=a`.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use parking_lot::Mutex;

    type Reply = Result<HttpResponse, String>;

    #[derive(Default)]
    struct Route {
        /// Replies handed out once each, in order.
        queued: VecDeque<Reply>,
        /// Reply used once the queue is drained.
        fallback: Option<Reply>,
    }

    #[derive(Default)]
    struct MockState {
        routes: HashMap<String, Route>,
        default_response: Option<HttpResponse>,
        recorded_requests: Vec<HttpRequest>,
        delay: Option<Duration>,
        fail_all: Option<String>,
    }

    /// A mock HTTP executor that returns scripted responses.
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        state: Arc<Mutex<MockState>>,
    }

    impl MockExecutor {
        /// Create a new mock executor.
        pub fn new() -> Self {
            Self::default()
        }

        /// Always answer `route` with `response`.
        pub fn with_response(self, route: impl Into<String>, response: HttpResponse) -> Self {
            self.set_response(route, response);
            self
        }

        /// Answer `route` with each reply in turn, then with the fallback.
        pub fn with_sequence(self, route: impl Into<String>, replies: Vec<Reply>) -> Self {
            self.state
                .lock()
                .routes
                .entry(route.into())
                .or_default()
                .queued
                .extend(replies);
            self
        }

        /// Fail requests to `route` without a response.
        pub fn with_transport_error(self, route: impl Into<String>, message: &str) -> Self {
            self.state
                .lock()
                .routes
                .entry(route.into())
                .or_default()
                .fallback = Some(Err(message.to_string()));
            self
        }

        /// Set a default response when no route matches.
        pub fn with_default_response(self, response: HttpResponse) -> Self {
            self.state.lock().default_response = Some(response);
            self
        }

        /// Delay every reply, keeping requests in flight.
        pub fn with_delay(self, delay: Duration) -> Self {
            self.state.lock().delay = Some(delay);
            self
        }

        /// Configure to fail all requests with an error.
        pub fn fail_with(self, message: impl Into<String>) -> Self {
            self.state.lock().fail_all = Some(message.into());
            self
        }

        /// Replace the fallback reply for `route` after construction.
        pub fn set_response(&self, route: impl Into<String>, response: HttpResponse) {
            self.state
                .lock()
                .routes
                .entry(route.into())
                .or_default()
                .fallback = Some(Ok(response));
        }

        /// Get all recorded requests.
        pub fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.state.lock().recorded_requests.clone()
        }

        /// Number of requests executed so far.
        pub fn request_count(&self) -> usize {
            self.state.lock().recorded_requests.len()
        }

        /// Number of requests executed against `route`.
        pub fn requests_to(&self, route: &str) -> usize {
            self.state
                .lock()
                .recorded_requests
                .iter()
                .filter(|r| route_of(&r.path) == route)
                .count()
        }

        /// Clear recorded requests.
        pub fn clear_recorded(&self) {
            self.state.lock().recorded_requests.clear();
        }

        /// Create a simple success response.
        pub fn success_response(body: serde_json::Value) -> HttpResponse {
            HttpResponse::json(200, body)
        }

        /// Create a simple error response.
        pub fn error_response(status: u16, message: &str) -> HttpResponse {
            HttpResponse::json(status, serde_json::json!({"error": message}))
        }

        /// Create a 404 Not Found response.
        pub fn not_found() -> HttpResponse {
            Self::error_response(404, "Not Found")
        }

        fn reply_for(&self, request: &HttpRequest) -> (Reply, Option<Duration>) {
            let mut state = self.state.lock();
            state.recorded_requests.push(request.clone());
            let delay = state.delay;

            if let Some(message) = &state.fail_all {
                return (Err(message.clone()), delay);
            }

            let route = route_of(&request.path);
            if let Some(entry) = state.routes.get_mut(&route) {
                if let Some(reply) = entry.queued.pop_front() {
                    return (reply, delay);
                }
                if let Some(reply) = &entry.fallback {
                    return (reply.clone(), delay);
                }
            }

            let reply = match &state.default_response {
                Some(response) => Ok(response.clone()),
                None => Ok(Self::not_found()),
            };
            (reply, delay)
        }
    }

    #[async_trait]
    impl HttpExecutor for MockExecutor {
        async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
            let (reply, delay) = self.reply_for(request);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            reply
        }
    }

    /// Path plus query string of a URL, or the input when it does not parse.
    pub fn route_of(url: &str) -> String {
        match url::Url::parse(url) {
            Ok(parsed) => match parsed.query() {
                Some(query) => format!("{}?{}", parsed.path(), query),
                None => parsed.path().to_string(),
            },
            Err(_) => url.to_string(),
        }
    }
}
