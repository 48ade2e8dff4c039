use std::fmt::Display;

use otadash_query::{query_key, Mutation, Query};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::scope::FIVE_MINUTES;

/// Changed fields for entities updated with partial objects.
pub type Patch = Map<String, Value>;

/// Variables of an update: the target id and the changed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update<V> {
    pub id: String,
    pub data: V,
}

impl<V> Update<V> {
    pub fn new(id: impl Display, data: V) -> Self {
        Self {
            id: id.to_string(),
            data,
        }
    }
}

/// A plain REST collection: `GET path`, `GET path/{id}`, `POST path`,
/// `PUT path/{id}`, `DELETE path/{id}`. Keys are rooted at `name`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Resource {
    pub name: &'static str,
    pub path: &'static str,
}

impl Resource {
    pub const fn new(name: &'static str, path: &'static str) -> Self {
        Self { name, path }
    }

    pub fn list<T>(&self) -> Query<Vec<T>> {
        Query::get(query_key![self.name], self.path).stale_time(FIVE_MINUTES)
    }

    pub fn get<T>(&self, id: impl Display) -> Query<T> {
        let id = id.to_string();
        let path = format!("{}/{}", self.path, id);
        let enabled = !id.is_empty();
        Query::get(query_key![self.name, id], path)
            .stale_time(FIVE_MINUTES)
            .enabled(enabled)
    }

    pub fn create<V, T>(&self) -> Mutation<V, T> {
        Mutation::post(self.path).invalidates(query_key![self.name])
    }

    pub fn update<V, T>(&self) -> Mutation<Update<V>, T>
    where
        V: Serialize + Send + Sync + 'static,
        T: 'static,
    {
        let path = self.path;
        Mutation::custom(move |api, update: Update<V>| async move {
            let response = api
                .put(&format!("{}/{}", path, update.id), &update.data)
                .await?;
            Ok(response.body)
        })
        .invalidates(query_key![self.name])
    }

    /// Deletion answers vary (empty, `{success}`, the deleted row), so the
    /// response is kept as raw JSON.
    pub fn delete(&self) -> Mutation<String, Value> {
        let path = self.path;
        Mutation::custom(move |api, id: String| async move {
            let response = api.delete(&format!("{}/{}", path, id)).await?;
            Ok(response.body)
        })
        .invalidates(query_key![self.name])
    }
}
