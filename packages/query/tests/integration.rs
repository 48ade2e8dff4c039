//! Queries and mutations over a real HTTP stack.

use std::sync::Arc;
use std::time::Duration;

use otadash_http::{ApiClient, ClientConfig};
use otadash_query::{
    query_key, ErrorNormalizer, Mutation, Query, QueryClient, QueryDefaults, RecordingNavigator,
    RetryConfig, RetryPolicy, ToastQueue,
};
use otadash_storage::{InMemoryStorage, Storage, TokenStore};
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Channel {
    id: String,
    name: String,
}

fn client(server: &MockServer, toasts: &ToastQueue) -> QueryClient {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let tokens = TokenStore::new(storage);
    tokens.set("secret");
    let api = ApiClient::new(&ClientConfig::new(server.uri()), tokens.clone()).unwrap();
    let retry = RetryPolicy::new(
        RetryConfig::default().with_base_delay(Duration::ZERO),
        tokens,
        Arc::new(RecordingNavigator::new()),
    );
    QueryClient::new(
        api,
        ErrorNormalizer::new(Arc::new(toasts.clone())),
        retry,
        QueryDefaults::default(),
    )
}

#[tokio::test]
async fn fetches_and_caches_channels() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dashboard/channels"))
        .and(query_param("app_id", "app-1"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "c1", "name": "production"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let toasts = ToastQueue::new();
    let client = client(&server, &toasts);
    let query: Query<Vec<Channel>> = Query::get(
        query_key!["channels", "app-1"],
        "/dashboard/channels?app_id=app-1",
    );

    let first = client.fetch(&query).await.unwrap().unwrap();
    let second = client.fetch(&query).await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(first[0].name, "production");
    assert!(toasts.is_empty());
}

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dashboard/apps"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dashboard/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let toasts = ToastQueue::new();
    let client = client(&server, &toasts);
    let query: Query<Vec<serde_json::Value>> = Query::get(query_key!["apps"], "/dashboard/apps");

    let apps = client.fetch(&query).await.unwrap();

    assert_eq!(apps, Some(vec![]));
    assert!(toasts.is_empty());
}

#[tokio::test]
async fn mutation_failure_produces_one_toast() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dashboard/channels"))
        .and(body_json(json!({"name": "beta", "app_id": "app-1"})))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"error": "Channel exists"})))
        .expect(1)
        .mount(&server)
        .await;

    let toasts = ToastQueue::new();
    let client = client(&server, &toasts);
    let create: Mutation<serde_json::Value, Channel> =
        Mutation::post("/dashboard/channels").invalidates(query_key!["channels"]);

    let error = client
        .mutate(&create, json!({"name": "beta", "app_id": "app-1"}))
        .await
        .unwrap_err();

    assert_eq!(error.status, Some(409));
    assert_eq!(error.message, "Channel exists");
    let shown = toasts.drain();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].message, "Channel exists");
}
