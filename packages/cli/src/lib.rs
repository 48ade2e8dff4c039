//! # otadash-cli
//!
//! The `otadash` command. Session, selections and language persist as JSON
//! files under the state directory, so consecutive invocations behave like
//! one long-running dashboard.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod output;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use serde_json::Value;

use otadash_api::{Dashboard, DashboardConfig};
use otadash_http::ClientConfig;
use otadash_query::QueryError;
use otadash_state::{GoTrueConfig, GoTrueProvider, IdentityProvider, PersistedAuth};
use otadash_storage::{keys, InMemoryStorage, JsonFileStorage, PersistedValue, Storage};

pub use cli::Cli;
use output::TerminalNavigator;

/// Execute the parsed command line.
///
/// Notifications raised along the way go to stderr. A failed query has
/// already been reported that way, so it only changes the exit code.
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let storage = open_storage(&cli)?;
    let provider = identity_provider(&cli, storage.clone())?;
    let config = DashboardConfig {
        client: ClientConfig::new(cli.api_url.clone()).with_timeout(cli.timeout()),
        ..DashboardConfig::default()
    };
    let dashboard = Dashboard::open(&config, storage, provider, Arc::new(TerminalNavigator))
        .context("Invalid API address")?;

    if let Err(error) = dashboard.session.init().await {
        tracing::warn!(%error, "Could not restore the session");
    }

    let result = commands::execute(cli.command, &dashboard).await;
    output::write_toasts(&mut io::stderr().lock(), &dashboard.toasts.drain())?;

    match result {
        Ok(Value::Null) => Ok(ExitCode::SUCCESS),
        Ok(value) => {
            output::print_json(&value)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(error) if error.downcast_ref::<QueryError>().is_some() => Ok(ExitCode::FAILURE),
        Err(error) => Err(error),
    }
}

fn open_storage(cli: &Cli) -> anyhow::Result<Arc<dyn Storage>> {
    match cli.state_dir() {
        Some(dir) => {
            let storage = JsonFileStorage::create(dir.clone())
                .with_context(|| format!("Cannot use {} for state", dir.display()))?;
            Ok(Arc::new(storage))
        }
        None => {
            tracing::warn!("No configuration directory, state will not be kept");
            Ok(Arc::new(InMemoryStorage::new()))
        }
    }
}

/// The identity client, resuming the persisted session so sign-out can
/// revoke it.
fn identity_provider(
    cli: &Cli,
    storage: Arc<dyn Storage>,
) -> anyhow::Result<Arc<dyn IdentityProvider>> {
    let auth: PersistedValue<PersistedAuth> = PersistedValue::new(storage, keys::AUTH);
    let session = auth.load().ok().flatten().and_then(|auth| auth.session);

    let config =
        GoTrueConfig::new(cli.auth_url.clone(), cli.anon_key.clone()).with_timeout(cli.timeout());
    let provider = GoTrueProvider::new(config).context("Cannot reach the identity service")?;
    Ok(Arc::new(provider.with_session(session)))
}
