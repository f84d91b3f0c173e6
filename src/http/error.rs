//! Mapping of orchestrator errors onto HTTP responses.

use crate::error::AuthError;
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::debug;

/// Error returned from every handler.
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            AuthError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AuthError::AlreadyExists => StatusCode::CONFLICT,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::BadCredentials => StatusCode::UNAUTHORIZED,
            AuthError::InvalidRole => StatusCode::BAD_REQUEST,
            AuthError::VerificationFailed => StatusCode::BAD_REQUEST,
            AuthError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection, "Rejected request body");
        Self(AuthError::InvalidArgument("body"))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        debug!(error = %rejection, "Rejected request path");
        Self(AuthError::InvalidArgument("account id"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.0.error_code(),
            "message": self.0.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AuthError::InvalidArgument("username"), StatusCode::BAD_REQUEST),
            (AuthError::AlreadyExists, StatusCode::CONFLICT),
            (AuthError::NotFound("account"), StatusCode::NOT_FOUND),
            (AuthError::BadCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidRole, StatusCode::BAD_REQUEST),
            (AuthError::VerificationFailed, StatusCode::BAD_REQUEST),
            (AuthError::StoreUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (AuthError::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status, "{err:?}");
        }
    }
}
