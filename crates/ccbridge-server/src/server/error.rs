//! OpenAI-shaped HTTP errors.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use ccbridge_core::openai::{ErrorDetail, ErrorResponse};

use crate::subprocess::SubprocessError;

/// An error rendered as `{"error":{"message","type","code"}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub kind: &'static str,
}

impl ApiError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            kind: "invalid_request_error",
        }
    }

    pub fn method_not_allowed() -> Self {
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            message: "method not allowed".to_string(),
            kind: "invalid_request_error",
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            kind: "api_error",
        }
    }

    fn body(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                message: self.message.clone(),
                kind: self.kind.to_string(),
                code: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body())).into_response()
    }
}

impl From<SubprocessError> for ApiError {
    fn from(err: SubprocessError) -> Self {
        error!(error = %err, "claude invocation failed");
        Self::internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_request(format!("invalid request body: {}", rejection.body_text()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn error_body_shape() {
        let value = serde_json::to_value(ApiError::method_not_allowed().body()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "error": {
                    "message": "method not allowed",
                    "type": "invalid_request_error",
                    "code": null,
                }
            })
        );
    }

    #[test]
    fn subprocess_errors_are_internal() {
        let err = ApiError::from(SubprocessError::SpawnFailed {
            reason: "No such file or directory".to_string(),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind, "api_error");
        assert_eq!(err.message, "failed to execute claude: No such file or directory");
    }
}
