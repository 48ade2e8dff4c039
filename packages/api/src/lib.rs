//! # otadash-api
//!
//! The dashboard's resources, each a thin set of [`Query`] and [`Mutation`]
//! builders over the generic query layer:
//!
//! | module | resources |
//! |---|---|
//! | [`apps`] | applications |
//! | [`organizations`] | organizations and their members |
//! | [`channels`], [`devices`], [`env_vars`] | per-app configuration |
//! | [`updates`] | OTA bundles, native updates and both combined |
//! | [`statistics`], [`update_logs`] | per-app reporting |
//! | [`products`], [`orders`], [`conversations`] | the commerce surface |
//! | [`onboarding`] | first organization and app |
//!
//! Per-app queries read the active application from an
//! [`ActiveAppStore`]; they stay disabled while nothing is selected.
//! Build a query when it is needed so its key reflects the current
//! selection.
//!
//! [`Dashboard`] wires the HTTP client, the query client, the session and
//! the selections together.
//!
//! [`Query`]: otadash_query::Query
//! [`Mutation`]: otadash_query::Mutation

pub mod apps;
pub mod channels;
pub mod context;
pub mod conversations;
pub mod devices;
pub mod env_vars;
pub mod models;
pub mod onboarding;
pub mod orders;
pub mod organizations;
pub mod products;
pub mod scope;
pub mod statistics;
pub mod update_logs;
pub mod updates;

mod resource;
#[cfg(test)]
mod testing;

pub use context::{Dashboard, DashboardConfig};
pub use models::{App, AppRole, Organization, OrganizationMember, OrganizationRole, Platform};
pub use resource::{Patch, Update};
pub use scope::{ActiveAppStore, ActiveOrganizationStore, NO_ACTIVE_APP};
