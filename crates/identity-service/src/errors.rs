//! Identity service error types.
//!
//! Error messages returned to clients are generic for server-side failures;
//! the underlying error is logged.

use crate::services::IssueError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Maps to HTTP status codes:
/// - BadRequest: 400 Bad Request
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl IdentityError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            IdentityError::BadRequest(_) => 400,
            IdentityError::Internal => 500,
        }
    }
}

impl From<IssueError> for IdentityError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::ReservedClaim(_)
            | IssueError::InvalidClaimName
            | IssueError::InvalidRequest(_) => IdentityError::BadRequest(err.to_string()),
            IssueError::Signing(_) => IdentityError::Internal,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            IdentityError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            IdentityError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
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
