//! Update activity reported by devices.

use std::time::Duration;

use otadash_http::with_params;
use otadash_query::{query_key, Query, QueryKey};
use serde::{Deserialize, Serialize};

use crate::models::Platform;
use crate::scope::{active_app_id, ActiveAppStore};

const PATH: &str = "/dashboard/update-logs";

/// Limit used in the cache key when none is given.
pub const DEFAULT_LIMIT: u32 = 100;

const STALE_TIME: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateAction {
    Get,
    Download,
    DownloadFail,
    Install,
    InstallFail,
    Set,
    FirstOpen,
    AppMovedToForeground,
    AppMovedToBackground,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateLog {
    #[serde(deserialize_with = "crate::models::string_or_number")]
    pub id: String,
    pub device_id: String,
    pub app_id: String,
    pub action: UpdateAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_version: Option<String>,
    pub platform: Platform,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateLogFilters {
    /// Defaults to the active app.
    pub app_id: Option<String>,
    pub device_id: Option<String>,
    pub limit: Option<u32>,
}

impl UpdateLogFilters {
    pub fn for_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Logs matching `filters`.
///
/// Unlike other per-app reads this runs without a selection, listing logs
/// across apps. `limit` is only sent when given.
pub fn list(active: &ActiveAppStore, filters: &UpdateLogFilters) -> Query<Vec<UpdateLog>> {
    let for_url = (active.clone(), filters.clone());
    let for_key = (active.clone(), filters.clone());
    Query::get_with(log_key(active, filters), move || {
        let (active, filters) = &for_url;
        Ok(with_params(
            PATH,
            [
                ("app_id", log_app_id(active, filters)),
                ("device_id", filters.device_id.clone().filter(|id| !id.is_empty())),
                ("limit", filters.limit.map(|limit| limit.to_string())),
            ],
        ))
    })
    .key_with(move || log_key(&for_key.0, &for_key.1))
    .stale_time(STALE_TIME)
}

/// The explicit app filter, else the active app.
fn log_app_id(active: &ActiveAppStore, filters: &UpdateLogFilters) -> Option<String> {
    filters
        .app_id
        .clone()
        .filter(|id| !id.is_empty())
        .or_else(|| active_app_id(active))
}

fn log_key(active: &ActiveAppStore, filters: &UpdateLogFilters) -> QueryKey {
    query_key![
        "update-logs",
        log_app_id(active, filters).unwrap_or_default(),
        filters.device_id.clone().unwrap_or_default(),
        filters.limit.unwrap_or(DEFAULT_LIMIT)
    ]
}
