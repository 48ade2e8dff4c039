//! The dashboard context against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use otadash_api::env_vars::{self, Environment, NewEnvVar};
use otadash_api::{apps, devices, Dashboard, DashboardConfig, NO_ACTIVE_APP};
use otadash_http::ClientConfig;
use otadash_query::{RecordingNavigator, RetryConfig, Severity};
use otadash_state::mock::MockIdentityProvider;
use otadash_storage::{InMemoryStorage, Storage, TokenStore};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app_json() -> Value {
    json!({
        "id": "7c1e",
        "name": "Acme Shop",
        "app_id": "com.acme.shop",
        "organization_id": "org-1",
        "user_id": "user-1",
        "platform": "android",
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z"
    })
}

fn open(server: &MockServer) -> Dashboard {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    TokenStore::new(storage.clone()).set("secret");
    let config = DashboardConfig {
        client: ClientConfig::new(server.uri()),
        retry: RetryConfig::default().with_base_delay(Duration::ZERO),
        ..DashboardConfig::default()
    };
    Dashboard::open(
        &config,
        storage,
        Arc::new(MockIdentityProvider::new()),
        Arc::new(RecordingNavigator::new()),
    )
    .unwrap()
}

#[tokio::test]
async fn concurrent_reads_share_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dashboard/devices"))
        .and(query_param("app_id", "com.acme.shop"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "data": [
                    {"id": "d1", "device_id": "8F2A", "platform": "ios"}
                ]}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dashboard = open(&server);
    let app = serde_json::from_value(app_json()).unwrap();
    dashboard.select_app(Some(app));

    let query = devices::list(&dashboard.active_app);
    let (first, second) = tokio::join!(
        dashboard.queries.fetch(&query),
        dashboard.queries.fetch(&query)
    );

    assert_eq!(first.unwrap(), second.unwrap());
    assert!(dashboard.toasts.is_empty());
}

#[tokio::test]
async fn app_is_resolved_by_bundle_identifier() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dashboard/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([app_json()])))
        .mount(&server)
        .await;

    let dashboard = open(&server);

    let app = dashboard
        .queries
        .fetch(&apps::get("com.acme.shop"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(app.id, "7c1e");

    let err = dashboard
        .queries
        .fetch(&apps::get("com.acme.other"))
        .await
        .unwrap_err();
    assert_eq!(err.message, "App not found: com.acme.other");
    assert_eq!(err.status, Some(404));
}

#[tokio::test]
async fn write_without_selection_raises_one_notification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let dashboard = open(&server);
    let err = dashboard
        .queries
        .mutate(
            &env_vars::create(&dashboard.active_app),
            NewEnvVar {
                key: "API_URL".to_string(),
                value: "https://api.acme.dev".to_string(),
                value_type: None,
                environment: Environment::All,
                channel: None,
                is_secret: Some(false),
                description: None,
            },
        )
        .await
        .unwrap_err();

    assert!(err.is_precondition());
    let toasts = dashboard.toasts.drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].message, NO_ACTIVE_APP);
    assert_eq!(toasts[0].severity, Severity::Error);
}

#[tokio::test]
async fn client_errors_surface_the_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/dashboard/apps/7c1e"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(json!({"message": "App still has active devices"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dashboard = open(&server);
    let err = dashboard
        .queries
        .mutate(&apps::delete(), "7c1e".to_string())
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(409));
    assert_eq!(err.message, "App still has active devices");
    assert_eq!(dashboard.toasts.len(), 1);
}
