//! Failure normalization.
//!
//! Every failure that reaches a caller goes through [`ErrorNormalizer`],
//! which logs it and raises exactly one error notification. Failures that
//! are already normalized pass through without a second notification.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{ErrorKind, Failure, QueryError, UNKNOWN_ERROR_MESSAGE};
use crate::notify::{Notifier, NullNotifier, Severity};

#[derive(Clone)]
pub struct ErrorNormalizer {
    notifier: Arc<dyn Notifier>,
}

impl ErrorNormalizer {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// A normalizer that only logs.
    pub fn silent() -> Self {
        Self::new(Arc::new(NullNotifier))
    }

    /// Normalize, log and notify.
    pub fn normalize(&self, failure: impl Into<Failure>) -> QueryError {
        let (error, fresh) = Self::classify(failure.into());
        if fresh {
            self.report(&error);
        }
        error
    }

    /// Map a failure to its normalized form without side effects.
    ///
    /// The flag is false when the failure was already normalized and must
    /// not be reported again.
    pub fn classify(failure: Failure) -> (QueryError, bool) {
        let error = match failure {
            Failure::Normalized(error) => return (error, false),
            Failure::Transport { message } => QueryError::new(ErrorKind::Transport, message),
            Failure::Http { status, body } => {
                let status = status.or_else(|| body_status(&body));
                let message = body_message(&body).unwrap_or_else(|| match status {
                    Some(status) => format!("Request failed with status code {}", status),
                    None => UNKNOWN_ERROR_MESSAGE.to_string(),
                });
                let mut error = QueryError::new(ErrorKind::Http, message);
                error.status = status;
                if !body.is_null() {
                    error.data = Some(body);
                }
                error
            }
            Failure::Unknown { raw } => QueryError::new(ErrorKind::Unknown, raw),
            Failure::Precondition { message } => QueryError::precondition(message),
        };
        (error, true)
    }

    /// Log and notify for an error the caller is about to see.
    pub fn report(&self, error: &QueryError) {
        tracing::error!(
            message = %error.message,
            status = ?error.status,
            kind = ?error.kind,
            "Query error"
        );
        self.notifier.notify(Severity::Error, &error.message);
    }
}

impl std::fmt::Debug for ErrorNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorNormalizer").finish_non_exhaustive()
    }
}

fn body_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|field| body.get(field).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

fn body_status(body: &Value) -> Option<u16> {
    ["status", "statusCode"]
        .iter()
        .filter_map(|field| body.get(field).and_then(Value::as_u64))
        .find_map(|n| u16::try_from(n).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ToastQueue;
    use serde_json::json;

    fn normalizer() -> (ErrorNormalizer, ToastQueue) {
        let toasts = ToastQueue::new();
        (ErrorNormalizer::new(Arc::new(toasts.clone())), toasts)
    }

    #[test]
    fn http_failure_takes_message_from_body() {
        let (normalizer, toasts) = normalizer();
        let error = normalizer.normalize(Failure::Http {
            status: Some(404),
            body: json!({"message": "Not found"}),
        });

        assert_eq!(error.message, "Not found");
        assert_eq!(error.status, Some(404));
        assert_eq!(error.kind, ErrorKind::Http);
        assert_eq!(error.data, Some(json!({"message": "Not found"})));

        let shown = toasts.drain();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].message, "Not found");
        assert_eq!(shown[0].severity, Severity::Error);
    }

    #[test]
    fn http_failure_falls_back_to_error_field_then_status() {
        let (error, _) = ErrorNormalizer::classify(Failure::Http {
            status: Some(400),
            body: json!({"error": "Invalid platform"}),
        });
        assert_eq!(error.message, "Invalid platform");

        let (error, _) = ErrorNormalizer::classify(Failure::Http {
            status: Some(502),
            body: Value::Null,
        });
        assert_eq!(error.message, "Request failed with status code 502");
        assert_eq!(error.data, None);
    }

    #[test]
    fn status_can_come_from_body() {
        let (error, _) = ErrorNormalizer::classify(Failure::Http {
            status: None,
            body: json!({"statusCode": 409, "message": "Conflict"}),
        });
        assert_eq!(error.status, Some(409));

        let (error, _) = ErrorNormalizer::classify(Failure::Http {
            status: None,
            body: json!({}),
        });
        assert_eq!(error.message, UNKNOWN_ERROR_MESSAGE);
        assert_eq!(error.status, None);
    }

    #[test]
    fn transport_and_unknown_keep_their_text() {
        let (normalizer, toasts) = normalizer();

        let error = normalizer.normalize(Failure::Transport {
            message: "connection refused".to_string(),
        });
        assert_eq!(error.kind, ErrorKind::Transport);
        assert_eq!(error.message, "connection refused");
        assert_eq!(error.status, None);

        let error = normalizer.normalize(Failure::unknown(""));
        assert_eq!(error.message, UNKNOWN_ERROR_MESSAGE);

        assert_eq!(toasts.len(), 2);
    }

    #[test]
    fn normalized_errors_pass_through_silently() {
        let (normalizer, toasts) = normalizer();
        let original = QueryError::new(ErrorKind::Http, "Forbidden").with_status(403);

        let error = normalizer.normalize(original.clone());

        assert_eq!(error, original);
        assert!(toasts.is_empty());
    }

    #[test]
    fn preconditions_are_reported() {
        let (normalizer, toasts) = normalizer();
        let error = normalizer.normalize(Failure::precondition("No active app selected"));
        assert!(error.is_precondition());
        assert_eq!(toasts.drain()[0].message, "No active app selected");
    }
}
