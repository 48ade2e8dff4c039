//! Environment variables of the active app.
//!
//! Writes that create variables are scoped by the active app and fail
//! with [`NO_ACTIVE_APP`](crate::NO_ACTIVE_APP) before any request when
//! nothing is selected. Secret values are only returned by [`reveal`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use otadash_query::{query_key, Mutation, Query};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::{Resource, Update};
use crate::scope::{app_scoped, app_scoped_path, ActiveAppStore};

const ENV_VARS: Resource = Resource::new("env-vars", "/dashboard/env-vars");

const STALE_TIME: Duration = Duration::from_secs(2 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    Development,
    All,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Development => "development",
            Environment::All => "all",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" | "prod" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "development" | "dev" => Ok(Environment::Development),
            "all" => Ok(Environment::All),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Number,
    Boolean,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    pub id: String,
    pub app_id: String,
    pub key: String,
    /// Masked for secrets until revealed.
    pub value: String,
    pub value_type: ValueType,
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub is_secret: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEnvVar {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_secret: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvVarChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_secret: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkVariable {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_secret: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkEnvVars {
    pub variables: Vec<BulkVariable>,
    pub environment: Environment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkCreated {
    pub created: u64,
    pub variables: Vec<EnvVar>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedVariable {
    pub key: String,
    pub value: String,
}

/// Server-side parse of `.env` style text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEnvContent {
    pub variables: Vec<ParsedVariable>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedSecret {
    pub value: String,
}

/// Variables of the active app, optionally for one environment.
pub fn list(active: &ActiveAppStore, environment: Option<Environment>) -> Query<Vec<EnvVar>> {
    app_scoped(
        move |app| query_key!["env-vars", app, environment.map(Environment::as_str)],
        active,
        ENV_VARS.path,
        vec![("environment", environment.map(|e| e.to_string()))],
    )
    .stale_time(STALE_TIME)
}

pub fn create(active: &ActiveAppStore) -> Mutation<NewEnvVar, EnvVar> {
    let active = active.clone();
    Mutation::custom(move |api, variable: NewEnvVar| {
        let path = app_scoped_path(&active, ENV_VARS.path);
        async move {
            let response = api.post(&path?, &variable).await?;
            Ok(response.body)
        }
    })
    .invalidates(query_key!["env-vars"])
}

pub fn bulk_create(active: &ActiveAppStore) -> Mutation<BulkEnvVars, BulkCreated> {
    let active = active.clone();
    Mutation::custom(move |api, bulk: BulkEnvVars| {
        let path = app_scoped_path(&active, "/dashboard/env-vars/bulk");
        async move {
            let response = api.post(&path?, &bulk).await?;
            Ok(response.body)
        }
    })
    .invalidates(query_key!["env-vars"])
}

pub fn update() -> Mutation<Update<EnvVarChanges>, EnvVar> {
    ENV_VARS.update()
}

pub fn delete() -> Mutation<String, Value> {
    ENV_VARS.delete()
}

/// Fetch the plain value of a secret by id.
pub fn reveal() -> Mutation<String, RevealedSecret> {
    Mutation::custom(|api, id: String| async move {
        let response = api
            .get(&format!("{}/{}/reveal", ENV_VARS.path, id))
            .await?;
        Ok(response.body)
    })
}

/// Parse `.env` text into key/value pairs without storing anything.
pub fn parse() -> Mutation<String, ParsedEnvContent> {
    Mutation::custom(|api, content: String| async move {
        let response = api
            .post(
                "/dashboard/env-vars/parse",
                &serde_json::json!({ "content": content }),
            )
            .await?;
        Ok(response.body)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client, no_app, shop_app};
    use crate::NO_ACTIVE_APP;
    use otadash_http::mock::MockExecutor;
    use otadash_query::ErrorKind;
    use serde_json::json;

    fn variable() -> NewEnvVar {
        NewEnvVar {
            key: "API_URL".to_string(),
            value: "https://api.acme.dev".to_string(),
            value_type: None,
            environment: Environment::Production,
            channel: None,
            is_secret: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn create_without_app_fails_before_any_request() {
        let executor = MockExecutor::new();
        let client = client(&executor);

        let err = client
            .mutate(&create(&no_app()), variable())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Precondition);
        assert_eq!(err.message, NO_ACTIVE_APP);
        assert_eq!(executor.request_count(), 0);
    }

    #[tokio::test]
    async fn bulk_create_is_scoped_by_app() {
        let executor = MockExecutor::new().with_response(
            "/dashboard/env-vars/bulk?app_id=com.acme.shop",
            MockExecutor::success_response(json!({"created": 0, "variables": []})),
        );
        let client = client(&executor);

        let created = client
            .mutate(
                &bulk_create(&shop_app()),
                BulkEnvVars {
                    variables: vec![],
                    environment: Environment::Staging,
                },
            )
            .await
            .unwrap();

        assert_eq!(created.created, 0);
        assert_eq!(
            executor.recorded_requests()[0].body,
            Some(json!({"variables": [], "environment": "staging"}))
        );
    }

    #[test]
    fn list_key_and_filter_follow_environment() {
        let active = shop_app();
        let all = list(&active, None);
        let staging = list(&active, Some(Environment::Staging));

        assert_eq!(
            all.key(),
            query_key!["env-vars", "com.acme.shop", Option::<&str>::None]
        );
        assert_eq!(
            staging.key(),
            query_key!["env-vars", "com.acme.shop", "staging"]
        );
    }

    #[tokio::test]
    async fn parse_posts_content() {
        let executor = MockExecutor::new().with_response(
            "/dashboard/env-vars/parse",
            MockExecutor::success_response(json!({
                "variables": [{"key": "A", "value": "1"}],
                "count": 1
            })),
        );
        let client = client(&executor);

        let parsed = client.mutate(&parse(), "A=1".to_string()).await.unwrap();

        assert_eq!(parsed.count, 1);
        assert_eq!(parsed.variables[0].key, "A");
        assert_eq!(
            executor.recorded_requests()[0].body,
            Some(json!({"content": "A=1"}))
        );
    }

    #[test]
    fn environment_parses_short_names() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("development".parse::<Environment>().unwrap(), Environment::Development);
        assert!("qa".parse::<Environment>().is_err());
    }
}
