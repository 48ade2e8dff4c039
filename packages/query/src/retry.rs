//! Retry decisions and backoff.

use std::sync::Arc;
use std::time::Duration;

use otadash_storage::TokenStore;
use parking_lot::Mutex;

use crate::error::QueryError;

/// Where the user is sent when the session is rejected.
pub const LOGIN_ROUTE: &str = "/auth/login";

/// Moves the user to another screen.
pub trait Navigator: Send + Sync {
    fn redirect(&self, route: &str);
}

/// Records redirects instead of performing them.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> Vec<String> {
        self.routes.lock().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.routes.lock().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, route: &str) {
        tracing::info!(route, "Redirecting");
        self.routes.lock().push(route.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first failure.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Statuses from this value up to 499 are never retried.
    ///
    /// Defaults to 40, which covers every 4xx status. 400 is the more
    /// conventional value.
    pub client_error_floor: u16,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            client_error_floor: 40,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

/// Exponential backoff: `base * 2^attempt`, capped at `max`.
pub fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(max)
}

#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    tokens: TokenStore,
    navigator: Arc<dyn Navigator>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig, tokens: TokenStore, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            config,
            tokens,
            navigator,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether to try again after `failure_count` earlier failures.
    ///
    /// A 401 is never retried; it also clears the stored token and sends
    /// the user to [`LOGIN_ROUTE`].
    pub fn should_retry(&self, failure_count: u32, error: &QueryError) -> bool {
        if error.is_unauthorized() {
            tracing::warn!("Session rejected, redirecting to login");
            self.tokens.clear();
            self.navigator.redirect(LOGIN_ROUTE);
            return false;
        }

        if let Some(status) = error.status {
            if status >= self.config.client_error_floor && status < 500 {
                return false;
            }
        }

        if error.is_precondition() {
            return false;
        }

        failure_count < self.config.max_retries
    }

    /// Wait before retry number `attempt` (zero based).
    pub fn delay(&self, attempt: u32) -> Duration {
        backoff_delay(self.config.base_delay, self.config.max_delay, attempt)
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
