//! Fixed storage keys shared by every store in the client.

/// Bearer token attached to API requests.
pub const ACCESS_TOKEN: &str = "access_token";

/// Serialized session state (user, session, pending verification).
pub const AUTH: &str = "auth";

/// Currently selected application.
pub const ACTIVE_APP: &str = "active_app";

/// Currently selected organization.
pub const ACTIVE_ORGANIZATION: &str = "active_organization";

/// User-chosen display language code.
pub const USER_LANGUAGE: &str = "user-lang";
