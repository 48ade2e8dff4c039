//! # otadash-http
//!
//! The single configured HTTP transport for the dashboard API.
//!
//! [`ApiClient`] exposes `get/post/put/patch/delete` over a fixed base
//! address. Every request carries `Authorization: Bearer <token>` when the
//! shared [`TokenStore`](otadash_storage::TokenStore) holds a token. A `401`
//! response clears the token, notifies the installed
//! [`UnauthorizedHandler`], and is then returned to the caller unchanged.
//! Nothing at this layer retries.
//!
//! ```ignore
//! use otadash_http::{ApiClient, ClientConfig};
//!
//! let client = ApiClient::new(&ClientConfig::default(), tokens)?;
//! let response = client.get("/dashboard/apps").await?;
//! ```
//!
//! The transport itself sits behind [`HttpExecutor`]; enable the
//! `test-utils` feature for a scripted [`mock::MockExecutor`].

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod params;
pub mod types;

pub use client::{ApiClient, UnauthorizedHandler};
pub use config::ClientConfig;
pub use error::HttpError;
pub use executor::{HttpExecutor, ReqwestExecutor};
pub use params::with_params;
pub use types::{HttpRequest, HttpResponse, Method};

#[cfg(any(test, feature = "test-utils"))]
pub use executor::mock;
