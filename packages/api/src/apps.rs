//! Applications.

use otadash_query::{query_key, unwrap_envelope, Failure, Mutation, Query};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::{App, Platform};
use crate::resource::{Resource, Update};
use crate::scope::FIVE_MINUTES;

const APPS: Resource = Resource::new("apps", "/dashboard/apps");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAppInput {
    pub app_id: String,
    pub name: String,
    pub organization_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateAppInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

pub fn list() -> Query<Vec<App>> {
    APPS.list()
}

/// One app, matched by `id` or by bundle identifier.
///
/// The backend has no single-app endpoint, so this filters the list.
/// Disabled for an empty id.
pub fn get(id: &str) -> Query<App> {
    let id = id.to_string();
    let enabled = !id.is_empty();
    let wanted = id.clone();
    Query::custom(query_key!["apps", id], move |api| {
        let wanted = wanted.clone();
        async move {
            let response = api.get(APPS.path).await?;
            let apps: Vec<App> = serde_json::from_value(unwrap_envelope(response.body))?;
            find(apps, &wanted)
        }
    })
    .stale_time(FIVE_MINUTES)
    .enabled(enabled)
}

/// Pick the app whose `id` or `app_id` equals `id`.
pub fn find(apps: Vec<App>, id: &str) -> Result<App, Failure> {
    apps.into_iter()
        .find(|app| app.id == id || app.app_id == id)
        .ok_or_else(|| Failure::Http {
            status: Some(404),
            body: json!({ "message": format!("App not found: {}", id) }),
        })
}

pub fn create() -> Mutation<CreateAppInput, App> {
    APPS.create()
}

pub fn update() -> Mutation<Update<UpdateAppInput>, App> {
    APPS.update()
}

pub fn delete() -> Mutation<String, Value> {
    APPS.delete()
}
