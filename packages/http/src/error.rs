#[derive(thiserror::Error, Debug)]
pub enum HttpError {
    /// The request never produced a response (connection, timeout, TLS).
    #[error("Network error: {message}")]
    Transport { message: String },

    /// The server answered with a non-2xx status.
    #[error("Request failed with status code {status}")]
    Status {
        status: u16,
        body: serde_json::Value,
    },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid URL: {message}")]
    InvalidUrl { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HttpError {
    /// HTTP status of the failure, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display_matches_wire_message() {
        let e = HttpError::Status {
            status: 404,
            body: serde_json::Value::Null,
        };
        assert_eq!(e.to_string(), "Request failed with status code 404");
        assert_eq!(e.status(), Some(404));
        assert!(!e.is_unauthorized());
    }

    #[test]
    fn transport_error_has_no_status() {
        let e = HttpError::Transport {
            message: "connection refused".to_string(),
        };
        assert_eq!(e.status(), None);
        assert!(e.to_string().contains("connection refused"));
    }

    #[test]
    fn unauthorized_detection() {
        let e = HttpError::Status {
            status: 401,
            body: serde_json::json!({"error": "expired"}),
        };
        assert!(e.is_unauthorized());
    }
}
