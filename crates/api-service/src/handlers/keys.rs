//! API key verification.

use axum::Json;
use serde::Serialize;
use tracing::instrument;

#[derive(Debug, Clone, Serialize)]
pub struct VerifyKeyResponse {
    pub valid: bool,
}

/// Handler for POST /api/v1/keys/verify
///
/// Reached only through the API-key filter, so any request that gets here
/// presented the admin key.
#[instrument(skip_all, name = "api.handlers.keys.verify")]
pub async fn verify_key() -> Json<VerifyKeyResponse> {
    Json(VerifyKeyResponse { valid: true })
}
