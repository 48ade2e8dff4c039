//! The query client: cache, single-flight, retry and invalidation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use otadash_http::ApiClient;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::cache::{Lookup, QueryCache, SharedFetch};
use crate::error::{Failure, QueryError};
use crate::key::QueryKey;
use crate::mutation::{Mutation, Target};
use crate::normalize::ErrorNormalizer;
use crate::query::{unwrap_envelope, Fetcher, Query};
use crate::retry::RetryPolicy;

/// Cache windows used when a query sets none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefaults {
    pub stale_time: Duration,
    pub gc_time: Duration,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(60),
            gc_time: Duration::from_secs(5 * 60),
        }
    }
}

struct Inner {
    api: ApiClient,
    normalizer: ErrorNormalizer,
    retry: RetryPolicy,
    defaults: QueryDefaults,
    cache: Arc<QueryCache>,
}

/// Runs [`Query`]s and [`Mutation`]s against an [`ApiClient`].
///
/// Cloning is cheap and every clone shares the same cache.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl QueryClient {
    pub fn new(
        api: ApiClient,
        normalizer: ErrorNormalizer,
        retry: RetryPolicy,
        defaults: QueryDefaults,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                normalizer,
                retry,
                defaults,
                cache: Arc::new(QueryCache::default()),
            }),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn normalizer(&self) -> &ErrorNormalizer {
        &self.inner.normalizer
    }

    pub fn defaults(&self) -> &QueryDefaults {
        &self.inner.defaults
    }

    /// Run `query`, using the cache where possible.
    ///
    /// Returns `Ok(None)` without touching the network when the query is
    /// disabled. A fresh cached value is returned as is; otherwise callers
    /// with the same key share a single request.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        query: &Query<T>,
    ) -> Result<Option<T>, QueryError> {
        let key = query.key();
        if !query.is_enabled() {
            tracing::debug!(%key, "Query disabled");
            return Ok(None);
        }

        let stale_time = query.stale_time.unwrap_or(self.inner.defaults.stale_time);
        let gc_time = query.gc_time.unwrap_or(self.inner.defaults.gc_time);

        let pending = match self.inner.cache.lookup(&key, stale_time, gc_time) {
            Lookup::Fresh(value) => {
                tracing::debug!(%key, "Serving cached query");
                return self.decode(value).map(Some);
            }
            Lookup::Pending(pending) => {
                tracing::debug!(%key, "Joining in-flight query");
                pending
            }
            Lookup::Miss(id) => {
                let fetch = self.start_fetch(&query.fetcher, &key, id);
                self.inner.cache.begin(&key, id, fetch, stale_time, gc_time)
            }
        };

        let value = pending.await?;
        self.decode(value).map(Some)
    }

    fn start_fetch(&self, fetcher: &Fetcher, key: &QueryKey, id: u64) -> SharedFetch {
        let cache = Arc::downgrade(&self.inner.cache);
        let api = self.inner.api.clone();
        let retry = self.inner.retry.clone();
        let normalizer = self.inner.normalizer.clone();
        let fetcher = fetcher.clone();
        let key = key.clone();

        async move {
            tracing::debug!(%key, "Fetching query");
            let label = key.to_string();
            let result = run_with_retry(&retry, &normalizer, &label, || {
                let fetcher = fetcher.clone();
                let api = api.clone();
                async move { fetcher.run(api).await }
            })
            .await;
            if let Some(cache) = cache.upgrade() {
                cache.complete(&key, id, &result);
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Run `mutation` once with `variables`.
    ///
    /// Failed attempts follow the same retry policy as queries. On success
    /// the mutation's invalidation prefixes are applied before returning.
    pub async fn mutate<V, T>(&self, mutation: &Mutation<V, T>, variables: V) -> Result<T, QueryError>
    where
        V: Serialize + Clone + Send + 'static,
        T: DeserializeOwned,
    {
        let value = match &mutation.target {
            Target::Endpoint { method, path } => {
                let method = *method;
                let body = if method.has_body() {
                    match serde_json::to_value(&variables) {
                        Ok(body) => Some(body),
                        Err(e) => {
                            return Err(self.inner.normalizer.normalize(Failure::unknown(
                                format!("Failed to encode request: {}", e),
                            )))
                        }
                    }
                } else {
                    None
                };
                let label = format!("{} {}", method, path);
                run_with_retry(&self.inner.retry, &self.inner.normalizer, &label, || {
                    let api = self.inner.api.clone();
                    let body = body.clone();
                    let path = path.clone();
                    async move {
                        let response = api.request(method, &path, body).await?;
                        Ok(response.body)
                    }
                })
                .await?
            }
            Target::Custom(mutate) => {
                run_with_retry(&self.inner.retry, &self.inner.normalizer, "mutation", || {
                    mutate(self.inner.api.clone(), variables.clone())
                })
                .await?
            }
        };

        for prefix in mutation.invalidated_keys() {
            self.invalidate(prefix);
        }

        self.decode_written(value)
    }

    /// Mark every query under `prefix` stale. Returns how many matched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let count = self.inner.cache.invalidate(prefix);
        tracing::debug!(%prefix, count, "Invalidated queries");
        count
    }

    /// Seed the cache as if `key` had just been fetched.
    pub fn set_query_data<T: Serialize>(&self, key: &QueryKey, value: &T) -> Result<(), QueryError> {
        let value = serde_json::to_value(value)
            .map_err(|e| self.inner.normalizer.normalize(Failure::unknown(e)))?;
        self.inner.cache.set(
            key,
            value,
            self.inner.defaults.stale_time,
            self.inner.defaults.gc_time,
        );
        Ok(())
    }

    /// The last value cached for `key`, fresh or not.
    pub fn get_query_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let value = self.inner.cache.get(key)?;
        serde_json::from_value(value).ok()
    }

    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        self.inner.cache.is_fresh(key)
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.inner.cache.is_fetching(key)
    }

    /// Evict entries unused for longer than their collection window.
    pub fn collect_garbage(&self) -> usize {
        self.inner.cache.collect_garbage()
    }

    pub fn cached_queries(&self) -> usize {
        self.inner.cache.len()
    }

    /// Drop every cached query.
    pub fn clear(&self) {
        tracing::debug!("Clearing query cache");
        self.inner.cache.clear();
    }

    fn decode<T: DeserializeOwned>(&self, value: Value) -> Result<T, QueryError> {
        serde_json::from_value(value).map_err(|e| self.inner.normalizer.normalize(Failure::from(e)))
    }

    /// Decode a write's response body as is, falling back to the `data`
    /// member of an enveloped body.
    fn decode_written<T: DeserializeOwned>(&self, value: Value) -> Result<T, QueryError> {
        let error = match T::deserialize(&value) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => e,
        };
        let enveloped = matches!(&value, Value::Object(map) if map.contains_key("data"));
        if enveloped {
            if let Ok(decoded) = T::deserialize(&unwrap_envelope(value)) {
                return Ok(decoded);
            }
        }
        Err(self.inner.normalizer.normalize(Failure::from(error)))
    }
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("api", &self.inner.api)
            .field("defaults", &self.inner.defaults)
            .finish_non_exhaustive()
    }
}

/// Run `attempt` until it succeeds or the policy gives up.
///
/// Only the error finally returned is reported; retried failures are
/// logged at warn level.
async fn run_with_retry<F, Fut>(
    retry: &RetryPolicy,
    normalizer: &ErrorNormalizer,
    label: &str,
    mut attempt: F,
) -> Result<Value, QueryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value, Failure>>,
{
    let mut failures = 0u32;
    loop {
        let failure = match attempt().await {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        let (error, fresh) = ErrorNormalizer::classify(failure);
        if !retry.should_retry(failures, &error) {
            if fresh {
                normalizer.report(&error);
            }
            return Err(error);
        }

        let delay = retry.delay(failures);
        tracing::warn!(
            target_key = label,
            attempt = failures + 1,
            delay_ms = delay.as_millis() as u64,
            error = %error.message,
            "Request failed, retrying"
        );
        tokio::time::sleep(delay).await;
        failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::notify::ToastQueue;
    use crate::query_key;
    use crate::retry::{RecordingNavigator, RetryConfig, LOGIN_ROUTE};
    use otadash_http::mock::MockExecutor;
    use otadash_http::{HttpResponse, Method};
    use otadash_storage::{InMemoryStorage, Storage, TokenStore};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Harness {
        client: QueryClient,
        executor: MockExecutor,
        toasts: ToastQueue,
        navigator: Arc<RecordingNavigator>,
        tokens: TokenStore,
    }

    fn harness(executor: MockExecutor) -> Harness {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let tokens = TokenStore::new(storage);
        tokens.set("token");
        let api = ApiClient::with_executor("http://mock.local", Arc::new(executor.clone()), tokens.clone())
            .unwrap();
        let toasts = ToastQueue::new();
        let navigator = Arc::new(RecordingNavigator::new());
        let retry = RetryPolicy::new(
            RetryConfig::default().with_base_delay(Duration::ZERO),
            tokens.clone(),
            navigator.clone(),
        );
        let client = QueryClient::new(
            api,
            ErrorNormalizer::new(Arc::new(toasts.clone())),
            retry,
            QueryDefaults::default(),
        );
        Harness {
            client,
            executor,
            toasts,
            navigator,
            tokens,
        }
    }

    fn apps_query() -> Query<Vec<String>> {
        Query::get(query_key!["apps"], "/dashboard/apps")
    }

    fn ok(body: Value) -> Result<HttpResponse, String> {
        Ok(MockExecutor::success_response(body))
    }

    fn status(code: u16) -> Result<HttpResponse, String> {
        Ok(MockExecutor::error_response(code, "failed"))
    }

    #[tokio::test]
    async fn unwraps_data_envelope() {
        let h = harness(MockExecutor::new().with_response(
            "/dashboard/apps",
            MockExecutor::success_response(json!({"data": ["a", "b"]})),
        ));

        let apps = h.client.fetch(&apps_query()).await.unwrap();
        assert_eq!(apps, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[tokio::test]
    async fn concurrent_fetches_share_one_request() {
        let h = harness(
            MockExecutor::new()
                .with_response("/dashboard/apps", MockExecutor::success_response(json!(["a"])))
                .with_delay(Duration::from_millis(50)),
        );
        let query = apps_query();

        let (first, second) = tokio::join!(h.client.fetch(&query), h.client.fetch(&query));

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(h.executor.request_count(), 1);
    }

    #[tokio::test]
    async fn fresh_results_are_served_from_cache_until_invalidated() {
        let h = harness(MockExecutor::new().with_response(
            "/dashboard/apps",
            MockExecutor::success_response(json!(["a"])),
        ));
        let query = apps_query();

        h.client.fetch(&query).await.unwrap();
        h.client.fetch(&query).await.unwrap();
        assert_eq!(h.executor.request_count(), 1);
        assert!(h.client.is_fresh(&query.key()));

        assert_eq!(h.client.invalidate(&query_key!["apps"]), 1);
        assert!(!h.client.is_fresh(&query.key()));
        assert_eq!(
            h.client.get_query_data::<Vec<String>>(&query.key()),
            Some(vec!["a".to_string()])
        );

        h.client.fetch(&query).await.unwrap();
        assert_eq!(h.executor.request_count(), 2);
    }

    #[tokio::test]
    async fn zero_stale_time_always_refetches() {
        let h = harness(MockExecutor::new().with_response(
            "/dashboard/apps",
            MockExecutor::success_response(json!([])),
        ));
        let query = apps_query().stale_time(Duration::ZERO);

        h.client.fetch(&query).await.unwrap();
        h.client.fetch(&query).await.unwrap();
        assert_eq!(h.executor.request_count(), 2);
    }

    #[tokio::test]
    async fn disabled_query_makes_no_request() {
        let h = harness(MockExecutor::new().with_response(
            "/dashboard/apps",
            MockExecutor::success_response(json!(["a"])),
        ));
        let selected = Arc::new(AtomicBool::new(false));
        let flag = selected.clone();
        let query = apps_query().enabled_when(move || flag.load(Ordering::SeqCst));

        assert_eq!(h.client.fetch(&query).await.unwrap(), None);
        assert_eq!(h.executor.request_count(), 0);

        selected.store(true, Ordering::SeqCst);
        assert!(h.client.fetch(&query).await.unwrap().is_some());
        assert_eq!(h.executor.request_count(), 1);
    }

    #[tokio::test]
    async fn server_errors_are_retried_silently_until_success() {
        let h = harness(MockExecutor::new().with_sequence(
            "/dashboard/apps",
            vec![status(500), Err("connection reset".to_string()), ok(json!(["a"]))],
        ));

        let apps = h.client.fetch(&apps_query()).await.unwrap();

        assert_eq!(apps, Some(vec!["a".to_string()]));
        assert_eq!(h.executor.request_count(), 3);
        assert!(h.toasts.is_empty());
    }

    #[tokio::test]
    async fn persistent_server_error_surfaces_once_after_four_attempts() {
        let h = harness(MockExecutor::new().with_response(
            "/dashboard/apps",
            MockExecutor::error_response(503, "Service unavailable"),
        ));

        let error = h.client.fetch(&apps_query()).await.unwrap_err();

        assert_eq!(h.executor.request_count(), 4);
        assert_eq!(error.status, Some(503));
        assert_eq!(error.message, "Service unavailable");
        assert_eq!(error.kind, ErrorKind::Http);
        assert_eq!(h.toasts.len(), 1);
        assert!(!h.client.is_fetching(&query_key!["apps"]));
    }

    #[tokio::test]
    async fn client_errors_fail_without_retry() {
        let h = harness(MockExecutor::new().with_response(
            "/dashboard/apps",
            MockExecutor::error_response(404, "Not Found"),
        ));

        let error = h.client.fetch(&apps_query()).await.unwrap_err();

        assert_eq!(h.executor.request_count(), 1);
        assert_eq!(error.status, Some(404));
        assert_eq!(h.toasts.drain()[0].message, "Not Found");
    }

    #[tokio::test]
    async fn unauthorized_redirects_to_login() {
        let h = harness(MockExecutor::new().with_response(
            "/dashboard/apps",
            MockExecutor::error_response(401, "Invalid token"),
        ));

        let error = h.client.fetch(&apps_query()).await.unwrap_err();

        assert!(error.is_unauthorized());
        assert_eq!(h.executor.request_count(), 1);
        assert_eq!(h.tokens.get(), None);
        assert_eq!(h.navigator.last().as_deref(), Some(LOGIN_ROUTE));
    }

    #[tokio::test]
    async fn precondition_fails_before_any_request() {
        let h = harness(MockExecutor::new());
        let query: Query<Value> = Query::get_with(query_key!["env-vars", None::<&str>], || {
            Err(Failure::precondition("No active app selected"))
        });

        let error = h.client.fetch(&query).await.unwrap_err();

        assert!(error.is_precondition());
        assert_eq!(error.message, "No active app selected");
        assert_eq!(h.executor.request_count(), 0);
        assert_eq!(h.toasts.len(), 1);
    }

    #[tokio::test]
    async fn undecodable_result_is_an_error() {
        let h = harness(MockExecutor::new().with_response(
            "/dashboard/apps",
            MockExecutor::success_response(json!({"unexpected": true})),
        ));

        let error = h.client.fetch(&apps_query()).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Unknown);
        assert!(error.message.starts_with("Failed to decode response"));
    }

    #[tokio::test]
    async fn custom_query_caches_composed_result() {
        let h = harness(
            MockExecutor::new()
                .with_response("/a", MockExecutor::success_response(json!([1])))
                .with_response("/b", MockExecutor::success_response(json!([2]))),
        );
        let query: Query<Vec<i64>> = Query::custom(query_key!["combined"], |api: ApiClient| async move {
            let mut a: Vec<i64> = api.get("/a").await?.decode()?;
            let b: Vec<i64> = api.get("/b").await?.decode()?;
            a.extend(b);
            Ok(a)
        });

        assert_eq!(h.client.fetch(&query).await.unwrap(), Some(vec![1, 2]));
        h.client.fetch(&query).await.unwrap();
        assert_eq!(h.executor.request_count(), 2);
    }

    #[tokio::test]
    async fn mutation_posts_variables_and_invalidates() {
        let h = harness(
            MockExecutor::new()
                .with_response("/dashboard/apps", MockExecutor::success_response(json!(["a"])))
                .with_response(
                    "/dashboard/channels",
                    MockExecutor::success_response(json!({"id": "c1"})),
                ),
        );
        let query = apps_query();
        h.client.fetch(&query).await.unwrap();

        let create: Mutation<Value, Value> =
            Mutation::post("/dashboard/channels").invalidates(query_key!["apps"]);
        let created = h
            .client
            .mutate(&create, json!({"name": "beta"}))
            .await
            .unwrap();

        assert_eq!(created, json!({"id": "c1"}));
        let sent = &h.executor.recorded_requests()[1];
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.body, Some(json!({"name": "beta"})));
        assert!(!h.client.is_fresh(&query.key()));
    }

    #[tokio::test]
    async fn mutations_are_not_deduplicated() {
        let h = harness(MockExecutor::new().with_default_response(HttpResponse::json(204, Value::Null)));
        let remove: Mutation<(), ()> = Mutation::delete("/dashboard/channels/c1");

        let (a, b) = tokio::join!(h.client.mutate(&remove, ()), h.client.mutate(&remove, ()));
        a.unwrap();
        b.unwrap();

        let recorded = h.executor.recorded_requests();
        assert_eq!(recorded.len(), 2);
        assert!(recorded.iter().all(|r| r.body.is_none()));
    }

    #[tokio::test]
    async fn mutation_errors_are_normalized() {
        let h = harness(MockExecutor::new().with_response(
            "/dashboard/channels",
            MockExecutor::error_response(422, "Name taken"),
        ));
        let create: Mutation<Value, Value> = Mutation::post("/dashboard/channels");

        let error = h.client.mutate(&create, json!({})).await.unwrap_err();

        assert_eq!(error.status, Some(422));
        assert_eq!(error.message, "Name taken");
        assert_eq!(h.executor.request_count(), 1);
        assert_eq!(h.toasts.len(), 1);
    }

    #[tokio::test]
    async fn enveloped_write_decodes_to_its_data() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Channel {
            id: String,
        }

        let body = json!({"success": true, "data": {"id": "c1"}});
        let h = harness(MockExecutor::new().with_default_response(MockExecutor::success_response(body.clone())));

        let typed: Mutation<Value, Channel> = Mutation::post("/dashboard/channels");
        let channel = h.client.mutate(&typed, json!({})).await.unwrap();
        assert_eq!(channel, Channel { id: "c1".to_string() });

        let raw: Mutation<Value, Value> = Mutation::post("/dashboard/channels");
        assert_eq!(h.client.mutate(&raw, json!({})).await.unwrap(), body);
    }

    #[tokio::test]
    async fn seeded_data_skips_the_network() {
        let h = harness(MockExecutor::new());
        let query = apps_query();
        h.client
            .set_query_data(&query.key(), &vec!["seeded".to_string()])
            .unwrap();

        let apps = h.client.fetch(&query).await.unwrap();
        assert_eq!(apps, Some(vec!["seeded".to_string()]));
        assert_eq!(h.executor.request_count(), 0);
    }

    #[tokio::test]
    async fn unused_entries_are_collected() {
        let h = harness(MockExecutor::new().with_response(
            "/dashboard/apps",
            MockExecutor::success_response(json!([])),
        ));
        let query = apps_query().gc_time(Duration::ZERO);

        h.client.fetch(&query).await.unwrap();
        assert_eq!(h.client.collect_garbage(), 1);
        assert_eq!(h.client.get_query_data::<Vec<String>>(&query.key()), None);
        assert_eq!(h.client.cached_queries(), 0);
    }
}
