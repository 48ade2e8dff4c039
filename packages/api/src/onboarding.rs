//! First-run setup: an organization and its first app in one call.

use otadash_query::{query_key, Mutation, QueryClient, QueryError};
use serde::{Deserialize, Serialize};

use crate::models::{App, Organization, Platform};
use crate::organizations;

const PATH: &str = "/onboarding";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationDraft {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDraft {
    pub name: String,
    pub platform: Platform,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingPayload {
    pub organization: OrganizationDraft,
    pub app: AppDraft,
}

impl OnboardingPayload {
    pub fn new(
        organization_name: impl Into<String>,
        app_name: impl Into<String>,
        platform: Platform,
    ) -> Self {
        Self {
            organization: OrganizationDraft {
                name: organization_name.into(),
            },
            app: AppDraft {
                name: app_name.into(),
                platform,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingResponse {
    pub organization: Organization,
    pub app: App,
}

pub fn submit() -> Mutation<OnboardingPayload, OnboardingResponse> {
    Mutation::post(PATH)
        .invalidates(query_key!["organizations"])
        .invalidates(query_key!["apps"])
}

/// Whether the signed-in user still has to create an organization.
///
/// Reads the organization list through the cache.
pub async fn needs_onboarding(client: &QueryClient) -> Result<bool, QueryError> {
    let organizations = client.fetch(&organizations::list()).await?;
    Ok(organizations.map_or(true, |list| list.is_empty()))
}
