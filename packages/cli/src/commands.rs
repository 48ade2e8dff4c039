//! Subcommand execution.
//!
//! Every command produces a JSON value for stdout. Query failures have
//! already been reported as notifications when they reach the caller.

use anyhow::{anyhow, Context as _};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use otadash_api::update_logs::UpdateLogFilters;
use otadash_api::{
    apps, channels, devices, env_vars, organizations, statistics, update_logs, updates, Dashboard,
    NO_ACTIVE_APP,
};
use otadash_query::Query;
use otadash_state::{Credentials, Registration};

use crate::cli::{
    AppsCommand, Command, EnvCommand, LangCommand, ListCommand, LogsArgs, OrgsCommand,
};

pub async fn execute(command: Command, dashboard: &Dashboard) -> anyhow::Result<Value> {
    match command {
        Command::Login(args) => {
            dashboard
                .session
                .login(&Credentials::new(args.email, args.password))
                .await?;
            Ok(whoami(dashboard))
        }
        Command::Register(args) => {
            let user = dashboard
                .session
                .register(&Registration {
                    email: args.email,
                    password: args.password,
                    business_name: args.business_name,
                })
                .await?;
            Ok(json!({
                "status": dashboard.session.status(),
                "user": user,
                "pending_verification_email": dashboard.session.pending_verification_email(),
            }))
        }
        Command::Verify { code } => {
            dashboard.session.verify_otp(&code).await?;
            Ok(whoami(dashboard))
        }
        Command::ResendOtp => {
            dashboard.session.resend_otp().await?;
            Ok(json!({ "sent_to": dashboard.session.pending_verification_email() }))
        }
        Command::Logout => {
            dashboard.logout().await?;
            Ok(whoami(dashboard))
        }
        Command::Whoami => Ok(whoami(dashboard)),
        Command::Apps(command) => execute_apps(command, dashboard).await,
        Command::Orgs(command) => execute_orgs(command, dashboard).await,
        Command::Devices(ListCommand::List) => {
            scoped(dashboard, &devices::list(&dashboard.active_app)).await
        }
        Command::Channels(ListCommand::List) => {
            scoped(dashboard, &channels::list(&dashboard.active_app)).await
        }
        Command::Bundles(ListCommand::List) => {
            scoped(dashboard, &updates::bundles(&dashboard.active_app)).await
        }
        Command::NativeUpdates(ListCommand::List) => {
            scoped(dashboard, &updates::native_updates(&dashboard.active_app)).await
        }
        Command::Updates(ListCommand::List) => {
            scoped(dashboard, &updates::updates_and_bundles(&dashboard.active_app)).await
        }
        Command::Env(EnvCommand::List { environment }) => {
            scoped(dashboard, &env_vars::list(&dashboard.active_app, environment)).await
        }
        Command::Stats { range } => {
            let summary = scoped(dashboard, &statistics::dashboard(&dashboard.active_app)).await?;
            let series = scoped(dashboard, &statistics::data(&dashboard.active_app, range)).await?;
            Ok(json!({ "range": range, "summary": summary, "series": series }))
        }
        Command::Logs(args) => execute_logs(args, dashboard).await,
        Command::Lang(LangCommand::Show) => Ok(language(dashboard)),
        Command::Lang(LangCommand::Set { language: chosen }) => {
            dashboard.language.set_language(chosen);
            Ok(language(dashboard))
        }
    }
}

async fn execute_apps(command: AppsCommand, dashboard: &Dashboard) -> anyhow::Result<Value> {
    match command {
        AppsCommand::List => fetch(dashboard, &apps::list()).await,
        AppsCommand::Show { id } => fetch(dashboard, &apps::get(&id)).await,
        AppsCommand::Select { id } => {
            let app = require(dashboard, &apps::get(&id), "An app id is required").await?;
            dashboard.select_app(Some(app.clone()));
            Ok(serde_json::to_value(app)?)
        }
        AppsCommand::Clear => {
            dashboard.select_app(None);
            Ok(Value::Null)
        }
    }
}

async fn execute_orgs(command: OrgsCommand, dashboard: &Dashboard) -> anyhow::Result<Value> {
    match command {
        OrgsCommand::List => fetch(dashboard, &organizations::list()).await,
        OrgsCommand::Select { id } => {
            let organizations =
                require(dashboard, &organizations::list(), "Organizations are unavailable").await?;
            let organization = organizations
                .into_iter()
                .find(|org| org.id == id || org.name == id)
                .ok_or_else(|| anyhow!("Organization not found: {}", id))?;
            dashboard.select_organization(Some(organization.clone()));
            Ok(serde_json::to_value(organization)?)
        }
        OrgsCommand::Clear => {
            dashboard.select_organization(None);
            Ok(Value::Null)
        }
    }
}

async fn execute_logs(args: LogsArgs, dashboard: &Dashboard) -> anyhow::Result<Value> {
    let filters = UpdateLogFilters {
        app_id: args.app,
        device_id: args.device,
        limit: args.limit,
    };
    fetch(dashboard, &update_logs::list(&dashboard.active_app, &filters)).await
}

fn whoami(dashboard: &Dashboard) -> Value {
    json!({
        "status": dashboard.session.status(),
        "user": dashboard.session.user(),
        "pending_verification_email": dashboard.session.pending_verification_email(),
        "active_app": dashboard.active_app.with(|app| app.map(|app| app.app_id.clone())),
        "active_organization": dashboard
            .active_organization
            .with(|org| org.map(|org| org.name.clone())),
        "language": language(dashboard),
    })
}

fn language(dashboard: &Dashboard) -> Value {
    let language = dashboard.language.language();
    json!({
        "code": language.code(),
        "name": language.name(),
        "direction": language.direction(),
    })
}

/// Run `query`, failing with `disabled` when it is not allowed to run.
async fn require<T>(dashboard: &Dashboard, query: &Query<T>, disabled: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    dashboard
        .queries
        .fetch(query)
        .await?
        .ok_or_else(|| anyhow!("{}", disabled))
}

async fn fetch<T>(dashboard: &Dashboard, query: &Query<T>) -> anyhow::Result<Value>
where
    T: DeserializeOwned + Serialize,
{
    let value = require(dashboard, query, "Nothing to fetch").await?;
    serde_json::to_value(value).context("Failed to encode the response")
}

/// Like [`fetch`] for reads that need the active app.
async fn scoped<T>(dashboard: &Dashboard, query: &Query<T>) -> anyhow::Result<Value>
where
    T: DeserializeOwned + Serialize,
{
    let hint = format!("{}. Pick one with `otadash apps select <id>`.", NO_ACTIVE_APP);
    let value = require(dashboard, query, &hint).await?;
    serde_json::to_value(value).context("Failed to encode the response")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use otadash_api::DashboardConfig;
    use otadash_http::mock::MockExecutor;
    use otadash_http::ApiClient;
    use otadash_query::{RecordingNavigator, RetryConfig};
    use otadash_state::mock::MockIdentityProvider;
    use otadash_storage::{InMemoryStorage, TokenStore};

    use crate::cli::LoginArgs;

    fn dashboard(executor: &MockExecutor) -> Dashboard {
        let storage = Arc::new(InMemoryStorage::new());
        let api = ApiClient::with_executor(
            "http://mock.local",
            Arc::new(executor.clone()),
            TokenStore::new(storage.clone()),
        )
        .unwrap();
        let config = DashboardConfig {
            retry: RetryConfig::default().with_base_delay(Duration::ZERO),
            ..DashboardConfig::default()
        };
        Dashboard::with_api(
            api,
            &config,
            storage,
            Arc::new(MockIdentityProvider::new().with_account("dev@acme.dev", "hunter22")),
            Arc::new(RecordingNavigator::new()),
        )
    }

    fn apps() -> Value {
        json!([{
            "id": "a1",
            "name": "Shop",
            "app_id": "com.acme.shop",
            "organization_id": "o1",
            "user_id": "u1",
            "platform": "ios",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }])
    }

    #[tokio::test]
    async fn whoami_reports_anonymous_session() {
        let dashboard = dashboard(&MockExecutor::new());
        let value = execute(Command::Whoami, &dashboard).await.unwrap();

        assert_eq!(value["status"], "anonymous");
        assert_eq!(value["active_app"], Value::Null);
        assert!(value["language"]["code"].is_string());
    }

    #[tokio::test]
    async fn login_then_whoami_shows_user() {
        let dashboard = dashboard(&MockExecutor::new());
        let login = Command::Login(LoginArgs {
            email: "dev@acme.dev".to_string(),
            password: "hunter22".to_string(),
        });

        let value = execute(login, &dashboard).await.unwrap();
        assert_eq!(value["status"], "authenticated");
        assert_eq!(value["user"]["email"], "dev@acme.dev");
    }

    #[tokio::test]
    async fn select_app_by_bundle_identifier() {
        let executor = MockExecutor::new()
            .with_response("/dashboard/apps", MockExecutor::success_response(apps()));
        let dashboard = dashboard(&executor);

        let command = Command::Apps(AppsCommand::Select {
            id: "com.acme.shop".to_string(),
        });
        let value = execute(command, &dashboard).await.unwrap();

        assert_eq!(value["id"], "a1");
        assert_eq!(dashboard.active_app.get().map(|app| app.id), Some("a1".to_string()));
    }

    #[tokio::test]
    async fn app_scoped_listing_needs_a_selection() {
        let executor = MockExecutor::new();
        let dashboard = dashboard(&executor);

        let err = execute(Command::Devices(ListCommand::List), &dashboard)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("otadash apps select"));
        assert_eq!(executor.request_count(), 0);
    }

    #[tokio::test]
    async fn language_choice_is_applied() {
        let dashboard = dashboard(&MockExecutor::new());
        let command = Command::Lang(LangCommand::Set {
            language: "ar".parse().unwrap(),
        });

        let value = execute(command, &dashboard).await.unwrap();
        assert_eq!(value["code"], "ar");
        assert_eq!(value["direction"], "rtl");
    }
}
