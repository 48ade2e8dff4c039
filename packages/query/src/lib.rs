//! # otadash-query
//!
//! The data-fetching policy layer of the dashboard client.
//!
//! - [`Query`]: a cached read bound to a [`QueryKey`]. Identical keys share
//!   one in-flight request; results stay fresh for the query's staleness
//!   window and are evicted after its garbage-collection window.
//! - [`Mutation`]: a write issued once per call, never cached.
//! - [`RetryPolicy`]: decides whether a failed attempt is retried and how
//!   long to wait first.
//! - [`ErrorNormalizer`]: turns every [`Failure`] into exactly one
//!   [`QueryError`] and one error notification.
//!
//! ```ignore
//! use otadash_query::{query_key, Query};
//!
//! let apps: Query<Vec<App>> = Query::get(query_key!["apps"], "/dashboard/apps")
//!     .stale_time(Duration::from_secs(300));
//! let apps = client.fetch(&apps).await?;
//! ```

pub mod client;
pub mod error;
pub mod key;
pub mod mutation;
pub mod normalize;
pub mod notify;
pub mod query;
pub mod retry;

mod cache;

pub use client::{QueryClient, QueryDefaults};
pub use error::{ErrorKind, Failure, QueryError, UNKNOWN_ERROR_MESSAGE};
pub use key::{KeyPart, QueryKey};
pub use mutation::Mutation;
pub use normalize::ErrorNormalizer;
pub use notify::{Notifier, NullNotifier, Severity, Toast, ToastQueue};
pub use query::{unwrap_envelope, Query};
pub use retry::{Navigator, RecordingNavigator, RetryConfig, RetryPolicy, LOGIN_ROUTE};
