//! Current caller handler.
//!
//! Describes the caller as seen after authentication and any policy gate,
//! so on the admin route the user id reflects admin elevation.

use crate::auth::claims::{resolve_email, resolve_user_id};
use crate::auth::policy::has_admin_claim;
use crate::auth::PolicyEngine;
use axum::{Extension, Json};
use common::claims::{Principal, CLAIM_EXP};
use common::types::UserId;
use serde::Serialize;
use tracing::instrument;

/// Response for the `/api/v1/me` endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Resolved user id (most recent `userid` claim).
    pub user_id: Option<UserId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub is_admin: bool,

    pub is_trusted_member: bool,

    /// Token expiration timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl MeResponse {
    pub fn from_principal(principal: &Principal) -> Self {
        Self {
            user_id: resolve_user_id(principal),
            email: resolve_email(principal).map(str::to_string),
            is_admin: has_admin_claim(principal),
            is_trusted_member: PolicyEngine::trusted_member(principal).is_success(),
            exp: principal
                .last(CLAIM_EXP)
                .and_then(|c| c.value.parse::<i64>().ok()),
        }
    }
}

/// Handler for GET /api/v1/me, /api/v1/me/trusted and /api/v1/me/admin
///
/// ## Response
///
/// ```json
/// {
///   "user_id": "45a57255-29c6-43d8-b17a-4e65698bd182",
///   "email": "someone@marquee.test",
///   "is_admin": false,
///   "is_trusted_member": true,
///   "exp": 1700043200
/// }
/// ```
#[instrument(skip_all, name = "api.handlers.me")]
pub async fn get_me(Extension(principal): Extension<Principal>) -> Json<MeResponse> {
    tracing::debug!(target: "api.handlers.me", "Returning caller identity");
    Json(MeResponse::from_principal(&principal))
}
