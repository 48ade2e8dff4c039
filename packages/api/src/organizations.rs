//! Organizations and their members.
//!
//! Organization queries use the client's default staleness.

use otadash_query::{query_key, Mutation, Query, QueryClient, QueryError, QueryKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Organization, OrganizationMember, OrganizationRole};
use crate::resource::Update;

const PATH: &str = "/organizations";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrganization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMember {
    pub email: String,
    pub role: OrganizationRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRole {
    pub user_id: String,
    pub role: OrganizationRole,
}

fn list_key() -> QueryKey {
    query_key!["organizations"]
}

fn members_key(organization_id: &str) -> QueryKey {
    query_key!["organizations", organization_id, "members"]
}

pub fn list() -> Query<Vec<Organization>> {
    Query::get(list_key(), PATH)
}

pub fn get(id: &str) -> Query<Organization> {
    Query::get(query_key!["organizations", id], format!("{}/{}", PATH, id)).enabled(!id.is_empty())
}

/// The bare POST. [`create`] also records the result in the cached list.
pub fn create_mutation() -> Mutation<CreateOrganization, Organization> {
    Mutation::post(PATH).invalidates(list_key())
}

/// Create an organization and append it to the cached list right away.
///
/// The list is still invalidated so the next read refetches it.
pub async fn create(
    client: &QueryClient,
    input: CreateOrganization,
) -> Result<Organization, QueryError> {
    let created = client.mutate(&create_mutation(), input).await?;

    let mut cached: Vec<Organization> = client.get_query_data(&list_key()).unwrap_or_default();
    cached.push(created.clone());
    client.set_query_data(&list_key(), &cached)?;
    client.invalidate(&list_key());

    Ok(created)
}

pub fn update() -> Mutation<Update<UpdateOrganization>, Organization> {
    Mutation::custom(|api, update: Update<UpdateOrganization>| async move {
        let response = api
            .put(&format!("{}/{}", PATH, update.id), &update.data)
            .await?;
        Ok(response.body)
    })
    .invalidates(list_key())
}

pub fn delete() -> Mutation<String, Value> {
    Mutation::custom(|api, id: String| async move {
        let response = api.delete(&format!("{}/{}", PATH, id)).await?;
        Ok(response.body)
    })
    .invalidates(list_key())
}

pub fn members(organization_id: &str) -> Query<Vec<OrganizationMember>> {
    Query::get(
        members_key(organization_id),
        format!("{}/{}/members", PATH, organization_id),
    )
    .enabled(!organization_id.is_empty())
}

pub fn add_member(organization_id: &str) -> Mutation<NewMember, OrganizationMember> {
    Mutation::post(format!("{}/{}/members", PATH, organization_id))
        .invalidates(members_key(organization_id))
}

pub fn update_member_role(organization_id: &str) -> Mutation<MemberRole, OrganizationMember> {
    let base = format!("{}/{}/members", PATH, organization_id);
    Mutation::custom(move |api, change: MemberRole| {
        let path = format!("{}/{}", base, change.user_id);
        async move {
            let response = api
                .put(&path, &serde_json::json!({ "role": change.role }))
                .await?;
            Ok(response.body)
        }
    })
    .invalidates(members_key(organization_id))
}

/// Remove the member whose user id is passed as the variables.
pub fn remove_member(organization_id: &str) -> Mutation<String, Value> {
    let base = format!("{}/{}/members", PATH, organization_id);
    Mutation::custom(move |api, user_id: String| {
        let path = format!("{}/{}", base, user_id);
        async move {
            let response = api.delete(&path).await?;
            Ok(response.body)
        }
    })
    .invalidates(members_key(organization_id))
}
