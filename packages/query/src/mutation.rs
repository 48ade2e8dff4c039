//! Writes.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use otadash_http::{ApiClient, Method};
use serde::Serialize;
use serde_json::Value;

use crate::error::Failure;
use crate::key::QueryKey;

type CustomMutate<V> =
    Arc<dyn Fn(ApiClient, V) -> BoxFuture<'static, Result<Value, Failure>> + Send + Sync>;

pub(crate) enum Target<V> {
    /// Send the variables as the JSON body of `method path`.
    Endpoint { method: Method, path: String },
    Custom(CustomMutate<V>),
}

fn custom_mutate<V, F, Fut, R>(mutate: F) -> CustomMutate<V>
where
    V: 'static,
    F: Fn(ApiClient, V) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Failure>> + Send + 'static,
    R: Serialize + 'static,
{
    Arc::new(move |api, variables| {
        let pending = mutate(api, variables);
        async move {
            let result = pending.await?;
            Ok(serde_json::to_value(result)?)
        }
        .boxed()
    })
}

impl<V> Clone for Target<V> {
    fn clone(&self) -> Self {
        match self {
            Target::Endpoint { method, path } => Target::Endpoint {
                method: *method,
                path: path.clone(),
            },
            Target::Custom(f) => Target::Custom(f.clone()),
        }
    }
}

/// A write taking variables `V` and decoding the response to `T`.
///
/// Mutations are never cached and never deduplicated. After a success,
/// every query under each [`invalidates`](Mutation::invalidates) prefix is
/// marked stale.
pub struct Mutation<V, T> {
    pub(crate) target: Target<V>,
    pub(crate) invalidates: Vec<QueryKey>,
    _marker: PhantomData<fn(V) -> T>,
}

impl<V, T> Mutation<V, T> {
    fn with_target(target: Target<V>) -> Self {
        Self {
            target,
            invalidates: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Send the variables to `path`. DELETE sends no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self::with_target(Target::Endpoint {
            method,
            path: path.into(),
        })
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Run `mutate` with the client and the variables.
    pub fn custom<F, Fut, R>(mutate: F) -> Self
    where
        F: Fn(ApiClient, V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Failure>> + Send + 'static,
        V: 'static,
        R: Serialize + 'static,
    {
        Self::with_target(Target::Custom(custom_mutate(mutate)))
    }

    /// Mark queries under `prefix` stale after a success.
    pub fn invalidates(mut self, prefix: QueryKey) -> Self {
        self.invalidates.push(prefix);
        self
    }

    pub fn invalidated_keys(&self) -> &[QueryKey] {
        &self.invalidates
    }
}

impl<V, T> Clone for Mutation<V, T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            invalidates: self.invalidates.clone(),
            _marker: PhantomData,
        }
    }
}

impl<V, T> std::fmt::Debug for Mutation<V, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Mutation");
        if let Target::Endpoint { method, path } = &self.target {
            s.field("method", method).field("path", path);
        }
        s.field("invalidates", &self.invalidates).finish()
    }
}
