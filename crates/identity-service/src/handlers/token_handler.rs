use crate::errors::IdentityError;
use crate::observability::metrics::record_token_issuance;
use crate::routes::AppState;
use crate::services::{IssueError, TokenRequest};
use axum::{extract::State, Json};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Handle token issuance request
///
/// POST /token
///
/// Responds `200 text/plain` with the signed token as the whole body.
#[instrument(skip_all, name = "identity.token.issue")]
pub async fn handle_issue_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TokenRequest>,
) -> Result<String, IdentityError> {
    let start = Instant::now();

    match state.issuer.issue(&request) {
        Ok(issued) => {
            record_token_issuance("success", None, start.elapsed());
            tracing::info!(
                target: "identity.token",
                jti = %issued.jti,
                user_id = %request.user_id,
                "Issued token"
            );
            Ok(issued.token)
        }
        Err(e) => {
            record_token_issuance("error", Some(error_type(&e)), start.elapsed());
            tracing::warn!(target: "identity.token", error = %e, "Token request rejected");
            Err(e.into())
        }
    }
}

fn error_type(err: &IssueError) -> &'static str {
    match err {
        IssueError::ReservedClaim(_) => "reserved_claim",
        IssueError::InvalidClaimName => "invalid_claim_name",
        IssueError::InvalidRequest(_) => "invalid_request",
        IssueError::Signing(_) => "signing",
    }
}
