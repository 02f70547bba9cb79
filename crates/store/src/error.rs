//! Error types for slice operations.

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a slice operation can resolve with.
///
/// Every variant is recoverable: the slice records the message and returns to
/// idle, ready for the next call.
#[derive(Debug, Error)]
pub enum SliceError {
    /// No record with the requested id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The service rejected the payload.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Summary from the service.
        message: String,
        /// Per-field rejections, when the service reports them.
        field_errors: Vec<FieldError>,
    },

    /// The record changed or disappeared concurrently.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The request could not complete.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Any other non-success response.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Response status code.
        status: u16,
        /// Message from the service, or the canonical reason.
        message: String,
    },

    /// A success response whose body does not match the entity.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The call was rejected locally and no request was made.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// One rejected field in a validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    #[serde(default)]
    pub object_name: String,
    pub field: String,
    pub message: String,
}

/// RFC 7807 problem body returned by the persistence service on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Machine-readable key, e.g. `error.idexists`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Entity name the error refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

/// Problem key the service uses when an update targets a record that no longer exists.
pub const ID_NOT_FOUND_KEY: &str = "error.idnotfound";

impl SliceError {
    /// Classify a non-success response.
    ///
    /// `body` is the raw response body; `app_name` selects the
    /// `X-<app>-error` alert header used when the body carries no message.
    #[must_use]
    pub fn from_response(status: StatusCode, headers: &HeaderMap, body: &str, app_name: &str) -> Self {
        let problem: Problem = serde_json::from_str(body).unwrap_or_default();
        let alert = headers
            .get(format!("x-{}-error", app_name.to_ascii_lowercase()))
            .and_then(|value| value.to_str().ok())
            .map(String::from);

        let message = problem
            .detail
            .clone()
            .or_else(|| problem.title.clone())
            .or(alert)
            .or_else(|| problem.message.clone())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            });

        match status {
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => Self::Conflict(message),
            StatusCode::BAD_REQUEST if problem.message.as_deref() == Some(ID_NOT_FOUND_KEY) => {
                Self::Conflict(message)
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Self::ValidationFailed {
                message,
                field_errors: problem.field_errors,
            },
            _ => Self::Http {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// HTTP status this error corresponds to, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::NotFound(_) => Some(StatusCode::NOT_FOUND),
            Self::ValidationFailed { .. } | Self::InvalidRequest(_) => Some(StatusCode::BAD_REQUEST),
            Self::Conflict(_) => Some(StatusCode::CONFLICT),
            Self::Http { status, .. } => StatusCode::from_u16(*status).ok(),
            Self::Network(err) => err.status(),
            Self::Decode(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn test_slice_error_display() {
        let err = SliceError::NotFound("StrapColor 999".to_string());
        assert_eq!(err.to_string(), "Not found: StrapColor 999");

        let err = SliceError::Http {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
    }

    #[test]
    fn test_not_found_prefers_problem_detail() {
        let body = r#"{"title":"Not Found","status":404,"detail":"404 NOT_FOUND"}"#;
        let err = SliceError::from_response(StatusCode::NOT_FOUND, &HeaderMap::new(), body, "app");
        assert!(matches!(err, SliceError::NotFound(ref m) if m == "404 NOT_FOUND"));
    }

    #[test]
    fn test_bad_request_is_validation_failure_with_field_errors() {
        let body = r#"{
            "title": "Method argument not valid",
            "status": 400,
            "message": "error.validation",
            "fieldErrors": [
                {"objectName": "strapColor", "field": "name", "message": "must not be null"}
            ]
        }"#;
        let err = SliceError::from_response(StatusCode::BAD_REQUEST, &HeaderMap::new(), body, "app");
        match err {
            SliceError::ValidationFailed {
                message,
                field_errors,
            } => {
                assert_eq!(message, "Method argument not valid");
                assert_eq!(field_errors.len(), 1);
                assert_eq!(field_errors[0].field, "name");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_record_on_update_is_conflict() {
        let body = r#"{"title":"Entity not found","status":400,"message":"error.idnotfound","params":"strapColor"}"#;
        let err = SliceError::from_response(StatusCode::BAD_REQUEST, &HeaderMap::new(), body, "app");
        assert!(matches!(err, SliceError::Conflict(ref m) if m == "Entity not found"));
    }

    #[test]
    fn test_alert_header_used_when_body_is_not_a_problem() {
        let mut headers = HeaderMap::new();
        headers.insert("x-slicekitapp-error", HeaderValue::from_static("error.http.409"));
        let err = SliceError::from_response(StatusCode::CONFLICT, &headers, "oops", "slicekitApp");
        assert!(matches!(err, SliceError::Conflict(ref m) if m == "error.http.409"));
    }

    #[test]
    fn test_unknown_status_falls_back_to_reason() {
        let err = SliceError::from_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &HeaderMap::new(),
            "",
            "app",
        );
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    }
}
