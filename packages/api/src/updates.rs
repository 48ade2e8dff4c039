//! OTA bundles and native (store) updates of the active app.

use otadash_query::{query_key, unwrap_envelope, Failure, Mutation, Query};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{string_or_number, Platform};
use crate::resource::{Patch, Resource, Update};
use crate::scope::{
    active_app_id, app_scoped, app_scoped_path, ActiveAppStore, FIVE_MINUTES,
};

const BUNDLES: Resource = Resource::new("bundles", "/dashboard/bundles");
const NATIVE_UPDATES: Resource = Resource::new("native-updates", "/dashboard/native-updates");
const NATIVE_UPLOAD_PATH: &str = "/admin/native-upload";

/// A web-layer bundle delivered over the air.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub platform: Platform,
    pub version: String,
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    pub channel: String,
    pub environment: String,
    pub required: bool,
    pub active: bool,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Lowest native build able to run this bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_native_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
}

/// A native binary published for store-less installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeUpdate {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub platform: Platform,
    pub version: String,
    pub version_code: u64,
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub channel: String,
    pub environment: String,
    pub required: bool,
    pub active: bool,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Bundle,
    Native,
}

/// Row of the combined updates listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOrBundle {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub platform: Platform,
    pub version: String,
    /// Native updates only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_code: Option<u64>,
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Bundles only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    pub channel: String,
    pub environment: String,
    pub required: bool,
    pub active: bool,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Native updates only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Native updates only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    /// Bundles only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_native_version: Option<u64>,
}

impl From<NativeUpdate> for UpdateOrBundle {
    fn from(update: NativeUpdate) -> Self {
        Self {
            id: update.id,
            kind: UpdateKind::Native,
            platform: update.platform,
            version: update.version,
            version_code: Some(update.version_code),
            download_url: update.download_url,
            checksum: update.checksum,
            session_key: None,
            channel: update.channel,
            environment: update.environment,
            required: update.required,
            active: update.active,
            created_at: update.created_at,
            created_by: update.created_by,
            file_size: update.file_size,
            release_notes: update.release_notes,
            min_native_version: None,
        }
    }
}

impl From<Bundle> for UpdateOrBundle {
    fn from(bundle: Bundle) -> Self {
        Self {
            id: bundle.id,
            kind: UpdateKind::Bundle,
            platform: bundle.platform,
            version: bundle.version,
            version_code: None,
            download_url: bundle.download_url,
            checksum: bundle.checksum,
            session_key: bundle.session_key,
            channel: bundle.channel,
            environment: bundle.environment,
            required: bundle.required,
            active: bundle.active,
            created_at: bundle.created_at,
            created_by: bundle.created_by,
            file_size: None,
            release_notes: None,
            min_native_version: bundle.min_native_version,
        }
    }
}

pub fn bundles(active: &ActiveAppStore) -> Query<Vec<Bundle>> {
    app_scoped(
        |app| query_key!["bundles", app],
        active,
        BUNDLES.path,
        vec![],
    )
}

pub fn bundle(id: &str) -> Query<Bundle> {
    BUNDLES.get(id)
}

pub fn create_bundle() -> Mutation<Patch, Bundle> {
    BUNDLES.create()
}

pub fn update_bundle() -> Mutation<Update<Patch>, Bundle> {
    BUNDLES.update()
}

pub fn delete_bundle() -> Mutation<String, Value> {
    BUNDLES.delete()
}

pub fn native_updates(active: &ActiveAppStore) -> Query<Vec<NativeUpdate>> {
    app_scoped(
        |app| query_key!["native-updates", app],
        active,
        NATIVE_UPDATES.path,
        vec![],
    )
}

pub fn native_update(id: &str) -> Query<NativeUpdate> {
    NATIVE_UPDATES.get(id)
}

/// Register a native update. Uploads go through the admin endpoint.
pub fn create_native_update() -> Mutation<Patch, NativeUpdate> {
    Mutation::post(NATIVE_UPLOAD_PATH).invalidates(query_key![NATIVE_UPDATES.name])
}

pub fn update_native_update() -> Mutation<Update<Patch>, NativeUpdate> {
    NATIVE_UPDATES.update()
}

pub fn delete_native_update() -> Mutation<String, Value> {
    NATIVE_UPDATES.delete()
}

/// Native updates followed by bundles, fetched concurrently.
///
/// A listing that does not come back as an array counts as empty.
pub fn updates_and_bundles(active: &ActiveAppStore) -> Query<Vec<UpdateOrBundle>> {
    let for_fetch = active.clone();
    let for_enabled = active.clone();
    let for_key = active.clone();
    Query::custom(
        query_key!["updates-bundles", active_app_id(active)],
        move |api| {
            let paths = app_scoped_path(&for_fetch, NATIVE_UPDATES.path).and_then(|native| {
                Ok((native, app_scoped_path(&for_fetch, BUNDLES.path)?))
            });
            async move {
                let (native_path, bundles_path) = paths?;
                let (native, bundles) =
                    futures::try_join!(api.get(&native_path), api.get(&bundles_path))?;
                let native: Vec<NativeUpdate> = listing(native.body)?;
                let bundles: Vec<Bundle> = listing(bundles.body)?;
                Ok(native
                    .into_iter()
                    .map(UpdateOrBundle::from)
                    .chain(bundles.into_iter().map(UpdateOrBundle::from))
                    .collect::<Vec<_>>())
            }
        },
    )
    .enabled_when(move || active_app_id(&for_enabled).is_some())
    .key_with(move || query_key!["updates-bundles", active_app_id(&for_key)])
    .stale_time(FIVE_MINUTES)
}

fn listing<T: DeserializeOwned>(body: Value) -> Result<Vec<T>, Failure> {
    match unwrap_envelope(body) {
        items @ Value::Array(_) => Ok(serde_json::from_value(items)?),
        _ => Ok(Vec::new()),
    }
}
