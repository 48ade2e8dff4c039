//! Cached reads.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use otadash_http::ApiClient;
use serde::Serialize;
use serde_json::Value;

use crate::error::Failure;
use crate::key::QueryKey;

/// Produces the request path at fetch time, or a precondition failure.
pub type UrlSource = Arc<dyn Fn() -> Result<String, Failure> + Send + Sync>;

pub(crate) type CustomFetch =
    Arc<dyn Fn(ApiClient) -> BoxFuture<'static, Result<Value, Failure>> + Send + Sync>;

type EnabledFn = Arc<dyn Fn() -> bool + Send + Sync>;

type KeyFn = Arc<dyn Fn() -> QueryKey + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Fetcher {
    /// GET the path and unwrap a `data` envelope.
    Get(UrlSource),
    /// Arbitrary async work; the result is cached as returned.
    Custom(CustomFetch),
}

impl Fetcher {
    fn fixed(path: String) -> Self {
        Fetcher::Get(Arc::new(move || Ok(path.clone())))
    }

    fn custom<F, Fut, R>(fetch: F) -> Self
    where
        F: Fn(ApiClient) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Failure>> + Send + 'static,
        R: Serialize + 'static,
    {
        Fetcher::Custom(Arc::new(move |api| {
            let pending = fetch(api);
            async move {
                let result = pending.await?;
                Ok(serde_json::to_value(result)?)
            }
            .boxed()
        }))
    }

    pub(crate) async fn run(&self, api: ApiClient) -> Result<Value, Failure> {
        match self {
            Fetcher::Get(url) => {
                let path = url()?;
                let response = api.get(&path).await?;
                Ok(unwrap_envelope(response.body))
            }
            Fetcher::Custom(fetch) => fetch(api).await,
        }
    }
}

/// Return the `data` member of an object that has one, otherwise the body.
pub fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// A keyed, cacheable read that decodes to `T`.
pub struct Query<T> {
    key: KeyFn,
    pub(crate) fetcher: Fetcher,
    pub(crate) stale_time: Option<Duration>,
    pub(crate) gc_time: Option<Duration>,
    enabled: Option<EnabledFn>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Query<T> {
    fn with_fetcher(key: QueryKey, fetcher: Fetcher) -> Self {
        Self {
            key: Arc::new(move || key.clone()),
            fetcher,
            stale_time: None,
            gc_time: None,
            enabled: None,
            _marker: PhantomData,
        }
    }

    /// GET a fixed path.
    pub fn get(key: QueryKey, path: impl Into<String>) -> Self {
        Self::with_fetcher(key, Fetcher::fixed(path.into()))
    }

    /// GET a path computed when the query runs.
    pub fn get_with<F>(key: QueryKey, path: F) -> Self
    where
        F: Fn() -> Result<String, Failure> + Send + Sync + 'static,
    {
        Self::with_fetcher(key, Fetcher::Get(Arc::new(path)))
    }

    /// Run `fetch` and cache whatever it produces.
    pub fn custom<F, Fut, R>(key: QueryKey, fetch: F) -> Self
    where
        F: Fn(ApiClient) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Failure>> + Send + 'static,
        R: Serialize + 'static,
    {
        Self::with_fetcher(key, Fetcher::custom(fetch))
    }

    /// Compute the cache key on every fetch, for keys that embed state
    /// read by the fetcher, such as the active app.
    pub fn key_with<F>(mut self, key: F) -> Self
    where
        F: Fn() -> QueryKey + Send + Sync + 'static,
    {
        self.key = Arc::new(key);
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = Some(gc_time);
        self
    }

    /// Only run while `predicate` holds. Checked on every fetch.
    pub fn enabled_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.enabled = Some(Arc::new(predicate));
        self
    }

    pub fn enabled(self, enabled: bool) -> Self {
        self.enabled_when(move || enabled)
    }

    /// The cache key as of now.
    pub fn key(&self) -> QueryKey {
        (self.key)()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.as_ref().map_or(true, |predicate| predicate())
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            fetcher: self.fetcher.clone(),
            stale_time: self.stale_time,
            gc_time: self.gc_time,
            enabled: self.enabled.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("key", &self.key())
            .field("stale_time", &self.stale_time)
            .field("gc_time", &self.gc_time)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_key;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn envelope_is_unwrapped_only_when_present() {
        assert_eq!(unwrap_envelope(json!({"data": [1, 2]})), json!([1, 2]));
        assert_eq!(unwrap_envelope(json!({"data": null})), Value::Null);
        assert_eq!(unwrap_envelope(json!({"items": []})), json!({"items": []}));
        assert_eq!(unwrap_envelope(json!([{"data": 1}])), json!([{"data": 1}]));
    }

    #[test]
    fn enabled_predicate_is_reevaluated() {
        let flag = Arc::new(AtomicBool::new(false));
        let seen = flag.clone();
        let query: Query<Value> =
            Query::get(query_key!["apps"], "/dashboard/apps").enabled_when(move || seen.load(Ordering::SeqCst));

        assert!(!query.is_enabled());
        flag.store(true, Ordering::SeqCst);
        assert!(query.is_enabled());
    }

    #[test]
    fn dynamic_key_is_recomputed() {
        let flag = Arc::new(AtomicBool::new(false));
        let seen = flag.clone();
        let query: Query<Value> = Query::get(query_key!["apps"], "/dashboard/apps")
            .key_with(move || query_key!["apps", seen.load(Ordering::SeqCst)]);

        assert_eq!(query.key(), query_key!["apps", false]);
        flag.store(true, Ordering::SeqCst);
        assert_eq!(query.key(), query_key!["apps", true]);
    }

    #[test]
    fn enabled_by_default() {
        let query: Query<Value> = Query::get(query_key!["apps"], "/dashboard/apps");
        assert!(query.is_enabled());
        assert!(!query.clone().enabled(false).is_enabled());
    }
}
