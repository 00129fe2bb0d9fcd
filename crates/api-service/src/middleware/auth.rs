//! Authentication and authorization middleware.
//!
//! Provides four middleware functions:
//! - `require_auth` - Validates the bearer token and stores the `Principal`
//!   in request extensions
//! - `optional_auth` - Same, but a request with no Authorization header
//!   continues with an empty `Principal`
//! - `require_policy` - Evaluates a policy against that `Principal`; on
//!   success the decision's claims are merged into a new `Principal`
//! - `require_api_key` - Checks the elevation header alone, no token

use crate::auth::{HeaderSource, Outcome, Policy, PolicyEngine, TokenValidator};
use crate::errors::ApiError;
use crate::observability::metrics::record_token_validation;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use common::claims::Principal;
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub validator: Arc<TokenValidator>,
}

/// State for one policy gate.
#[derive(Clone)]
pub struct PolicyGate {
    pub engine: Arc<PolicyEngine>,
    pub policy: Policy,
}

/// Extract Bearer token from the Authorization header.
fn extract_bearer_token(req: &Request) -> Result<&str, ApiError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "api.middleware.auth", "Missing Authorization header");
            ApiError::InvalidToken("Missing Authorization header".to_string())
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "api.middleware.auth", "Invalid Authorization header format");
        ApiError::InvalidToken("Invalid Authorization header format".to_string())
    })
}

/// Bearer authentication.
///
/// # Response
///
/// - Returns 401 Unauthorized if token is missing or invalid
/// - Continues to next handler with a `Principal` in extensions if valid
#[instrument(skip_all, name = "api.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_bearer_token(&req)?;
    let principal = authenticate(&state.validator, token)?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

/// Bearer authentication for routes that also accept anonymous callers.
///
/// An absent Authorization header yields an empty `Principal`, which a
/// later policy gate may elevate. A header that is present is held to the
/// same rules as [`require_auth`].
#[instrument(skip_all, name = "api.middleware.optional_auth")]
pub async fn optional_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let principal = if req.headers().contains_key(AUTHORIZATION) {
        let token = extract_bearer_token(&req)?;
        authenticate(&state.validator, token)?
    } else {
        tracing::debug!(target: "api.middleware.auth", "Anonymous request");
        Principal::default()
    };

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

fn authenticate(validator: &TokenValidator, token: &str) -> Result<Principal, ApiError> {
    match validator.validate(token) {
        Ok(principal) => {
            record_token_validation("success", None);
            Ok(principal)
        }
        Err(e) => {
            record_token_validation("error", Some(e.as_label()));
            Err(e.into())
        }
    }
}

/// Policy gate. Must run after `require_auth` or `optional_auth`.
///
/// # Response
///
/// - Returns 403 Forbidden if the policy fails
/// - Continues with the merged `Principal` in extensions on success
#[instrument(skip_all, name = "api.middleware.policy")]
pub async fn require_policy(
    State(gate): State<Arc<PolicyGate>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let principal = req.extensions_mut().remove::<Principal>().ok_or_else(|| {
        tracing::error!(
            target: "api.middleware.policy",
            policy = gate.policy.as_str(),
            "Policy gate reached without an authenticated principal"
        );
        ApiError::Internal
    })?;

    let decision = gate
        .engine
        .evaluate(gate.policy, &principal, Some(req.headers() as &dyn HeaderSource))
        .await;

    match decision.outcome() {
        Outcome::Succeed => {
            req.extensions_mut().insert(decision.merge_into(principal));
            Ok(next.run(req).await)
        }
        Outcome::Fail(reason) => {
            tracing::debug!(
                target: "api.middleware.policy",
                policy = gate.policy.as_str(),
                reason = reason.as_label(),
                "Policy denied request"
            );
            Err(reason.into())
        }
    }
}

/// API-key filter for routes that take no bearer token.
///
/// # Response
///
/// - 401 "API key missing" when the elevation header is absent
/// - 401 "Invalid API key" when it does not match
#[instrument(skip_all, name = "api.middleware.api_key")]
pub async fn require_api_key(
    State(engine): State<Arc<PolicyEngine>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let Some(presented) = req.headers().header(engine.header_name()) else {
        tracing::debug!(target: "api.middleware.api_key", "API key header missing");
        return Err(ApiError::InvalidApiKey("API key missing".to_string()));
    };

    if !engine.matches_admin_key(presented) {
        tracing::debug!(target: "api.middleware.api_key", "API key mismatch");
        return Err(ApiError::InvalidApiKey("Invalid API key".to_string()));
    }

    Ok(next.run(req).await)
}
