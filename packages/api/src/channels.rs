//! Release channels of the active app.

use otadash_query::{query_key, Mutation, Query};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::resource::Resource;
use crate::scope::{app_scoped, ActiveAppStore};

const CHANNELS: Resource = Resource::new("channels", "/dashboard/channels");

/// A release channel. Only `name` is relied upon; the rest of the row is
/// kept as returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(deserialize_with = "crate::models::string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub fn list(active: &ActiveAppStore) -> Query<Vec<Channel>> {
    app_scoped(
        |app| query_key!["channels", app],
        active,
        CHANNELS.path,
        vec![],
    )
}

pub fn delete() -> Mutation<String, Value> {
    CHANNELS.delete()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client, no_app, shop_app};
    use otadash_http::mock::MockExecutor;
    use serde_json::json;

    #[tokio::test]
    async fn lists_channels_of_active_app() {
        let executor = MockExecutor::new().with_response(
            "/dashboard/channels?app_id=com.acme.shop",
            MockExecutor::success_response(json!({
                "success": true,
                "data": [{"id": 3, "name": "beta", "public": false}]
            })),
        );
        let client = client(&executor);

        let channels = client.fetch(&list(&shop_app())).await.unwrap().unwrap();

        assert_eq!(channels[0].id, "3");
        assert_eq!(channels[0].name, "beta");
        assert_eq!(channels[0].extra["public"], json!(false));
    }

    #[tokio::test]
    async fn nothing_selected_makes_no_request() {
        let executor = MockExecutor::new();
        let client = client(&executor);

        let query = list(&no_app());
        assert_eq!(query.key(), query_key!["channels", Option::<String>::None]);
        assert_eq!(client.fetch(&query).await.unwrap(), None);
        assert_eq!(executor.request_count(), 0);
    }
}
