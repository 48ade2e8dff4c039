//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use otadash_api::env_vars::Environment;
use otadash_api::statistics::StatsRange;
use otadash_http::config::DEFAULT_BASE_URL;
use otadash_state::Language;

/// Address of a locally running identity service.
pub const DEFAULT_AUTH_URL: &str = "http://localhost:54321";

/// otadash - manage OTA updates from the terminal
#[derive(Parser, Debug)]
#[command(name = "otadash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Dashboard API base address
    #[arg(long, env = "OTADASH_API_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub api_url: String,

    /// Identity service address
    #[arg(long, env = "OTADASH_AUTH_URL", default_value = DEFAULT_AUTH_URL, global = true)]
    pub auth_url: String,

    /// Public key sent to the identity service
    #[arg(long, env = "OTADASH_ANON_KEY", default_value = "", hide_env_values = true, global = true)]
    pub anon_key: String,

    /// Where the session and selections are kept
    #[arg(long, env = "OTADASH_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Per-request timeout
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout_secs: u64,

    /// Log requests, cache activity and session changes
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The state directory, defaulting to `<config dir>/otadash`.
    pub fn state_dir(&self) -> Option<PathBuf> {
        self.state_dir
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join("otadash")))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in with email and password
    Login(LoginArgs),
    /// Create an account; a verification code is emailed
    Register(RegisterArgs),
    /// Confirm the emailed verification code
    Verify {
        code: String,
    },
    /// Send the verification code again
    ResendOtp,
    /// Sign out and forget the local session
    Logout,
    /// Show the session, the selections and the language
    Whoami,
    /// Applications
    #[command(subcommand)]
    Apps(AppsCommand),
    /// Organizations
    #[command(subcommand)]
    Orgs(OrgsCommand),
    /// Devices of the active app
    #[command(subcommand)]
    Devices(ListCommand),
    /// Release channels of the active app
    #[command(subcommand)]
    Channels(ListCommand),
    /// OTA bundles of the active app
    #[command(subcommand)]
    Bundles(ListCommand),
    /// Native updates of the active app
    #[command(subcommand)]
    NativeUpdates(ListCommand),
    /// Native updates and bundles in one listing
    #[command(subcommand)]
    Updates(ListCommand),
    /// Environment variables of the active app
    #[command(subcommand)]
    Env(EnvCommand),
    /// Dashboard statistics of the active app
    Stats {
        /// Period of the chart series
        #[arg(long, default_value_t = StatsRange::Month)]
        range: StatsRange,
    },
    /// Update activity reported by devices
    Logs(LogsArgs),
    /// Display language
    #[command(subcommand)]
    Lang(LangCommand),
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(long, env = "OTADASH_EMAIL")]
    pub email: String,
    #[arg(long, env = "OTADASH_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "OTADASH_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub business_name: String,
}

#[derive(Subcommand, Debug)]
pub enum AppsCommand {
    List,
    /// Show one app by id or bundle identifier
    Show { id: String },
    /// Make an app the active one
    Select { id: String },
    /// Forget the active app
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum OrgsCommand {
    List,
    /// Make an organization the active one
    Select { id: String },
    /// Forget the active organization
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    List,
}

#[derive(Subcommand, Debug)]
pub enum EnvCommand {
    List {
        #[arg(long)]
        environment: Option<Environment>,
    },
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Only this device
    #[arg(long)]
    pub device: Option<String>,
    /// Maximum number of entries
    #[arg(long)]
    pub limit: Option<u32>,
    /// Another app than the active one
    #[arg(long)]
    pub app: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum LangCommand {
    Show,
    /// Choose `en`, `fr` or `ar`
    Set { language: Language },
}
