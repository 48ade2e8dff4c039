//! The active application and organization.

use std::time::Duration;

use otadash_http::with_params;
use otadash_query::{Failure, Query, QueryKey};
use otadash_state::Selection;

use crate::models::{App, Organization};

pub type ActiveAppStore = Selection<App>;
pub type ActiveOrganizationStore = Selection<Organization>;

/// Raised by writes that need an app while none is selected.
pub const NO_ACTIVE_APP: &str = "No active app selected";

pub(crate) const FIVE_MINUTES: Duration = Duration::from_secs(5 * 60);

/// Bundle identifier of the active app, if any.
pub fn active_app_id(active: &ActiveAppStore) -> Option<String> {
    active
        .with(|app| app.map(|app| app.app_id.clone()))
        .filter(|id| !id.is_empty())
}

pub fn require_app_id(active: &ActiveAppStore) -> Result<String, Failure> {
    active_app_id(active).ok_or_else(|| Failure::precondition(NO_ACTIVE_APP))
}

/// GET `path?app_id=<active>&<params>` while an app is selected.
///
/// `key` receives the active app id. Both the key and the URL are built
/// from the selection at fetch time, so a query held across a selection
/// change caches each app under its own key. The query is disabled while
/// nothing is selected.
pub(crate) fn app_scoped<T: 'static, K>(
    key: K,
    active: &ActiveAppStore,
    path: &'static str,
    params: Vec<(&'static str, Option<String>)>,
) -> Query<T>
where
    K: Fn(Option<String>) -> QueryKey + Send + Sync + 'static,
{
    let for_url = active.clone();
    let for_enabled = active.clone();
    let for_key = active.clone();
    let initial = key(active_app_id(active));
    Query::get_with(initial, move || {
        let app_id = require_app_id(&for_url)?;
        let pairs = std::iter::once(("app_id", Some(app_id.as_str())))
            .chain(params.iter().map(|(name, value)| (*name, value.as_deref())));
        Ok(with_params(path, pairs))
    })
    .enabled_when(move || active_app_id(&for_enabled).is_some())
    .key_with(move || key(active_app_id(&for_key)))
    .stale_time(FIVE_MINUTES)
}

/// `path?app_id=<active>` for writes, or the precondition failure.
pub(crate) fn app_scoped_path(active: &ActiveAppStore, path: &str) -> Result<String, Failure> {
    let app_id = require_app_id(active)?;
    Ok(with_params(path, [("app_id", Some(app_id))]))
}
