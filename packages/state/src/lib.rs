//! # otadash-state
//!
//! Process-wide client state, each value owned by one store and shared
//! through cheap clones:
//!
//! - [`SessionStore`]: the signed-in user, the session and the OTP
//!   verification step, driven by an [`IdentityProvider`].
//! - [`Selection`]: the active application or organization.
//! - [`LanguageStore`]: the display language.
//!
//! Every store writes through to a [`Storage`](otadash_storage::Storage)
//! so a restart resumes where the last run left off.

pub mod error;
pub mod gotrue;
pub mod identity;
pub mod language;
pub mod selection;
pub mod session;

pub use error::{IdentityError, SessionError, UnsupportedLanguage};
pub use gotrue::{GoTrueConfig, GoTrueProvider};
pub use identity::{
    AuthCallback, AuthEvent, AuthListeners, AuthResponse, Credentials, IdentityProvider, OtpType,
    Registration, Session, Subscription, User,
};
pub use language::{Direction, Language, LanguageStore};
pub use selection::Selection;
pub use session::{PersistedAuth, SessionStatus, SessionStore};

#[cfg(any(test, feature = "test-utils"))]
pub use identity::mock;
