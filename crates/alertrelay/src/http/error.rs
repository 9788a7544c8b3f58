use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::user::FieldError;

/// A failed request, rendered as `{"error": "..."}`.
///
/// Signup validation failures render as `{"errors": [...]}` instead.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

#[derive(Debug)]
enum ErrorBody {
    Message(String),
    Fields(Vec<FieldError>),
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// An error with the given status and client-facing message.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody::Message(message.into()),
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// A 500 carrying `message`; `cause` is logged and never sent.
    pub(crate) fn internal(message: &str, cause: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "{message}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Map an unreadable JSON body to `message`, keeping 413 for bodies over
    /// the size limit.
    pub(crate) fn from_rejection(rejection: &JsonRejection, message: &str) -> Self {
        tracing::debug!(error = %rejection, "rejected request body");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }
        Self::bad_request(message)
    }

    pub(crate) fn validation(errors: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody::Fields(errors),
        }
    }

    /// HTTP status of the response.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = match self.body {
            ErrorBody::Message(message) => json!({ "error": message }),
            ErrorBody::Fields(errors) => json!({ "errors": errors }),
        };
        (self.status, Json(payload)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_message_body() {
        let (status, body) = body_json(ApiError::not_found("User not found")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "User not found" }));
    }

    #[tokio::test]
    async fn test_internal_hides_cause() {
        let cause = "disk I/O error at page 12";
        let (status, body) = body_json(ApiError::internal("Database error", &cause)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Database error");
        assert!(!body.to_string().contains("page 12"));
    }

    #[tokio::test]
    async fn test_validation_body() {
        let errors = crate::user::SignupRequest::default()
            .validate(6)
            .unwrap_err();
        let (status, body) = body_json(ApiError::validation(errors)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["path"], "name");
        assert_eq!(body["errors"].as_array().unwrap().len(), 4);
    }
}
