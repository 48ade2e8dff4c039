//! The normalized error shape and the failures it is built from.

use otadash_http::HttpError;
use serde::Serialize;

/// Message used when a failure carries no usable text.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Where a [`QueryError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response was received (unreachable host, timeout).
    Transport,
    /// The server answered with an error status.
    Http,
    /// Anything else, including undecodable responses.
    Unknown,
    /// A required input was missing before any request was made.
    Precondition,
}

/// The single error type surfaced by queries and mutations.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct QueryError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub kind: ErrorKind,
}

impl QueryError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: if message.trim().is_empty() {
                UNKNOWN_ERROR_MESSAGE.to_string()
            } else {
                message
            },
            status: None,
            data: None,
            kind,
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Precondition, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_precondition(&self) -> bool {
        self.kind == ErrorKind::Precondition
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

/// A failure as caught, before normalization.
///
/// Classification happens once, where the failure is caught; the
/// [`ErrorNormalizer`](crate::ErrorNormalizer) maps each variant to a
/// [`QueryError`].
#[derive(Debug, Clone)]
pub enum Failure {
    /// Already normalized; passed through untouched.
    Normalized(QueryError),
    Transport {
        message: String,
    },
    Http {
        status: Option<u16>,
        body: serde_json::Value,
    },
    Unknown {
        raw: String,
    },
    Precondition {
        message: String,
    },
}

impl Failure {
    pub fn precondition(message: impl Into<String>) -> Self {
        Failure::Precondition {
            message: message.into(),
        }
    }

    pub fn unknown(raw: impl std::fmt::Display) -> Self {
        Failure::Unknown {
            raw: raw.to_string(),
        }
    }
}

impl From<HttpError> for Failure {
    fn from(error: HttpError) -> Self {
        match error {
            HttpError::Transport { message } => Failure::Transport { message },
            HttpError::Status { status, body } => Failure::Http {
                status: Some(status),
                body,
            },
            HttpError::UrlParse(_) | HttpError::InvalidUrl { .. } => Failure::Precondition {
                message: error.to_string(),
            },
            HttpError::Json(_) => Failure::Unknown {
                raw: error.to_string(),
            },
        }
    }
}

impl From<QueryError> for Failure {
    fn from(error: QueryError) -> Self {
        Failure::Normalized(error)
    }
}

impl From<serde_json::Error> for Failure {
    fn from(error: serde_json::Error) -> Self {
        Failure::Unknown {
            raw: format!("Failed to decode response: {}", error),
        }
    }
}
