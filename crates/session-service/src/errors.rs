//! Session service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Provider
//! rejections are surfaced verbatim; internal failures are logged
//! server-side and answered with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::types::{ErrorDetail, ErrorResponse};
use thiserror::Error;

/// Session service error type.
///
/// Maps to HTTP status codes:
/// - BadRequest: 400 Bad Request
/// - NotFound: 404 Not Found
/// - Provider: 403 Forbidden
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The conferencing provider rejected or failed the call.
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            SessionError::BadRequest(_) => 400,
            SessionError::Provider(_) => 403,
            SessionError::NotFound(_) => 404,
            SessionError::Internal(_) => 500,
        }
    }

    /// Short label used for the `error_type` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::BadRequest(_) => "validation",
            SessionError::NotFound(_) => "not_found",
            SessionError::Provider(_) => "provider",
            SessionError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            SessionError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            SessionError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            SessionError::Provider(message) => {
                tracing::warn!(target: "session.provider", error = %message, "Provider call failed");
                (StatusCode::FORBIDDEN, "PROVIDER_ERROR", message.clone())
            }
            SessionError::Internal(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "session.internal", error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            SessionError::BadRequest("Missing required field: title".to_string()).to_string(),
            "Bad request: Missing required field: title"
        );
        assert_eq!(
            SessionError::NotFound("Meeting not found".to_string()).to_string(),
            "Not found: Meeting not found"
        );
        assert_eq!(
            SessionError::Provider("quota exceeded".to_string()).to_string(),
            "Provider error: quota exceeded"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(SessionError::BadRequest(String::new()).status_code(), 400);
        assert_eq!(SessionError::Provider(String::new()).status_code(), 403);
        assert_eq!(SessionError::NotFound(String::new()).status_code(), 404);
        assert_eq!(SessionError::Internal(String::new()).status_code(), 500);
    }

    #[tokio::test]
    async fn test_into_response_bad_request() {
        let response =
            SessionError::BadRequest("Missing required field: title".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
        assert_eq!(body["error"]["message"], "Missing required field: title");
    }

    #[tokio::test]
    async fn test_into_response_provider_message_is_verbatim() {
        let response =
            SessionError::Provider("The meeting limit has been reached".to_string())
                .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "PROVIDER_ERROR");
        assert_eq!(body["error"]["message"], "The meeting limit has been reached");
    }

    #[tokio::test]
    async fn test_into_response_internal_hides_details() {
        let response =
            SessionError::Internal("provider response had no Meeting".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_into_response_not_found() {
        let response = SessionError::NotFound("Attendee not found".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "Attendee not found");
    }
}
