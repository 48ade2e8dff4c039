use otadash_http::HttpError;

/// Errors reported by an identity provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdentityError {
    /// The provider answered and refused the request.
    #[error("{message}")]
    Rejected { status: Option<u16>, message: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Invalid response from identity provider: {0}")]
    InvalidResponse(String),

    #[error("Not signed in")]
    NotSignedIn,
}

impl IdentityError {
    pub fn rejected(message: impl Into<String>) -> Self {
        IdentityError::Rejected {
            status: None,
            message: message.into(),
        }
    }
}

impl From<HttpError> for IdentityError {
    fn from(error: HttpError) -> Self {
        match error {
            HttpError::Transport { message } => IdentityError::Transport(message),
            HttpError::Status { status, .. } => IdentityError::Rejected {
                status: Some(status),
                message: error.to_string(),
            },
            other => IdentityError::InvalidResponse(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for IdentityError {
    fn from(error: serde_json::Error) -> Self {
        IdentityError::InvalidResponse(error.to_string())
    }
}

/// Errors from session lifecycle operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("No pending verification email")]
    NoPendingVerification,

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported language: {0}")]
pub struct UnsupportedLanguage(pub String);
