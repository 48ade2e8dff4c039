//! Cache keys.
//!
//! A [`QueryKey`] is an ordered list of [`KeyPart`]s, e.g.
//! `["update-logs", "app-1", null, 100]`. Two queries with equal keys share
//! one cache entry; invalidation matches keys by prefix.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Str(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Str(s)
    }
}

impl From<&String> for KeyPart {
    fn from(s: &String) -> Self {
        KeyPart::Str(s.clone())
    }
}

impl From<bool> for KeyPart {
    fn from(b: bool) -> Self {
        KeyPart::Bool(b)
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        KeyPart::Int(n)
    }
}

impl From<i32> for KeyPart {
    fn from(n: i32) -> Self {
        KeyPart::Int(n.into())
    }
}

impl From<u32> for KeyPart {
    fn from(n: u32) -> Self {
        KeyPart::Int(n.into())
    }
}

impl From<usize> for KeyPart {
    fn from(n: usize) -> Self {
        match i64::try_from(n) {
            Ok(n) => KeyPart::Int(n),
            Err(_) => KeyPart::Str(n.to_string()),
        }
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyPart::Null, Into::into)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a part.
    pub fn push(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    /// True if `prefix` matches the leading parts of this key.
    ///
    /// The empty key is a prefix of every key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

/// Build a [`QueryKey`] from parts convertible into [`KeyPart`].
///
/// ```
/// use otadash_query::query_key;
///
/// let key = query_key!["devices", "app-1"];
/// assert_eq!(key.to_string(), r#"["devices","app-1"]"#);
/// ```
#[macro_export]
macro_rules! query_key {
    () => {
        $crate::QueryKey::default()
    };
    ($($part:expr),+ $(,)?) => {
        $crate::QueryKey::new(vec![$($crate::KeyPart::from($part)),+])
    };
}
