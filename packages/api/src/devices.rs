//! Devices that checked in for the active app.

use otadash_query::{query_key, Mutation, Query};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Platform;
use crate::resource::Resource;
use crate::scope::{app_scoped, ActiveAppStore};

const DEVICES: Resource = Resource::new("devices", "/dashboard/devices");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(deserialize_with = "crate::models::string_or_number")]
    pub id: String,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Set when the device was moved off its default channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_bundle_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_native_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Version of the installed OTA bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    /// Native app version, e.g. `1.0.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_build: Option<String>,
    /// Native build number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_emulator: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_prod: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_stats_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_stats_at: Option<String>,
}

/// Move a device to another channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAssignment {
    pub id: String,
    pub channel: String,
}

pub fn list(active: &ActiveAppStore) -> Query<Vec<Device>> {
    app_scoped(
        |app| query_key!["devices", app],
        active,
        DEVICES.path,
        vec![],
    )
}

pub fn delete() -> Mutation<String, Value> {
    DEVICES.delete()
}

pub fn update_channel() -> Mutation<ChannelAssignment, Device> {
    Mutation::custom(|api, assignment: ChannelAssignment| async move {
        let response = api
            .put(
                &format!("{}/{}/channel", DEVICES.path, assignment.id),
                &serde_json::json!({ "channel": assignment.channel }),
            )
            .await?;
        Ok(response.body)
    })
    .invalidates(query_key!["devices"])
}
