//! API service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Messages
//! for token failures are generic; the concrete reason is logged at debug by
//! whoever produced the error.

use crate::auth::policy::FailureReason;
use crate::auth::TokenValidationError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Challenge sent with 401 responses on bearer-protected routes.
const BEARER_CHALLENGE: &str = "Bearer realm=\"marquee-api\", error=\"invalid_token\"";

/// Maps to HTTP status codes:
/// - InvalidToken: 401 Unauthorized (with `WWW-Authenticate: Bearer`)
/// - InvalidApiKey: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidToken(_) | ApiError::InvalidApiKey(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::Internal => 500,
        }
    }
}

impl From<TokenValidationError> for ApiError {
    fn from(err: TokenValidationError) -> Self {
        ApiError::InvalidToken(err.to_string())
    }
}

impl From<FailureReason> for ApiError {
    fn from(reason: FailureReason) -> Self {
        ApiError::Forbidden(reason.to_string())
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

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            ApiError::InvalidApiKey(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_API_KEY", reason.clone())
            }
            ApiError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            ApiError::Internal => (
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

        let mut response = (status, Json(error_response)).into_response();

        // Bearer challenge only for token failures; the API-key filter has no token
        if matches!(self, ApiError::InvalidToken(_)) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(BEARER_CHALLENGE),
            );
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::InvalidToken("x".into()).status_code(), 401);
        assert_eq!(ApiError::InvalidApiKey("x".into()).status_code(), 401);
        assert_eq!(ApiError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(ApiError::Internal.status_code(), 500);
    }

    #[test]
    fn test_validation_error_message_is_generic() {
        let err = ApiError::from(TokenValidationError::SignatureMismatch);
        assert!(
            matches!(&err, ApiError::InvalidToken(msg) if msg == "The access token is invalid or expired")
        );
    }

    #[tokio::test]
    async fn test_invalid_token_has_bearer_challenge() {
        let response = ApiError::InvalidToken("The access token is invalid or expired".into())
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(challenge.starts_with("Bearer"));
        assert!(challenge.contains("invalid_token"));

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_invalid_api_key_has_no_bearer_challenge() {
        let response = ApiError::InvalidApiKey("API key missing".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_API_KEY");
        assert_eq!(body["error"]["message"], "API key missing");
    }

    #[tokio::test]
    async fn test_forbidden_from_failure_reason() {
        let response = ApiError::from(FailureReason::ElevationKeyMismatch).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "FORBIDDEN");
        assert_eq!(
            body["error"]["message"],
            FailureReason::ElevationKeyMismatch.to_string()
        );
    }

    #[tokio::test]
    async fn test_internal_response_is_generic() {
        let response = ApiError::Internal.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }
}
