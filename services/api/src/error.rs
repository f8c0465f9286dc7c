//! Custom error types for the API service

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use classroom::{CoreError, ErrorKind};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid bearer token
    #[error("Login required")]
    Unauthorized,

    /// Malformed request body
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Failure reported by the classroom core
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
        ErrorKind::ResourceExhausted => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (kind, message) = match self {
            ApiError::Unauthorized => (ErrorKind::Unauthenticated, "Login required".to_string()),
            ApiError::BadRequest(msg) => (ErrorKind::InvalidArgument, msg),
            ApiError::Core(err) => {
                let kind = err.kind();
                let message = match &err {
                    CoreError::PermissionDenied(msg)
                    | CoreError::InvalidArgument(msg)
                    | CoreError::NotFound(msg)
                    | CoreError::FailedPrecondition(msg)
                    | CoreError::ResourceExhausted(msg) => msg.clone(),
                    CoreError::Unauthenticated => "Login required".to_string(),
                    CoreError::Internal(_) | CoreError::Database(_) => {
                        error!("Request failed: {}", err);
                        "Internal server error".to_string()
                    }
                };
                (kind, message)
            }
        };

        let body = Json(json!({
            "error": message,
            "code": kind.as_str(),
        }));

        (status_for(kind), body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_kinds_map_to_statuses() {
        let cases = [
            (CoreError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (CoreError::PermissionDenied("x".into()), StatusCode::FORBIDDEN),
            (CoreError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                CoreError::FailedPrecondition("x".into()),
                StatusCode::PRECONDITION_FAILED,
            ),
            (CoreError::ResourceExhausted("x".into()), StatusCode::CONFLICT),
            (
                CoreError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_unauthorized_is_401() {
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
