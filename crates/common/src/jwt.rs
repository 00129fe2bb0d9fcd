//! JWT utilities shared across Marquee auth components.
//!
//! This module provides:
//! - Size limits for DoS prevention
//! - The fixed token lifetime
//! - Clock skew constants for iat validation
//! - Unverified payload peeking (used client-side to read `exp`)
//! - iat validation logic
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - [`decode_payload_unverified`] and [`extract_expiry`] do NOT check the
//!   signature. They exist for a client deciding whether its own cached token
//!   is worth presenting; servers must verify instead.
//! - Error messages are generic; details go to debug logs.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

use crate::claims::CLAIM_EXP;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Tokens carry a handful of claims plus whatever custom claims the caller
/// asked for; anything past 8KB is rejected before base64 decoding or HMAC
/// verification.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Lifetime of every issued token: `exp = iat + TOKEN_LIFETIME`.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(12 * 60 * 60);

/// Default JWT clock skew tolerance (5 minutes).
///
/// Tokens with `iat` more than this far in the future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors from the unverified JWT helpers in this module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Payload has no numeric `exp` claim.
    #[error("The access token is invalid or expired")]
    MissingExpiry,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Functions
// =============================================================================

/// Decode the JWT payload WITHOUT verifying the signature.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Not three dot-separated parts, bad base64, or the
///   payload is not a JSON object
pub fn decode_payload_unverified(token: &str) -> Result<Map<String, Value>, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let payload_part = parts.get(1).ok_or(JwtValidationError::MalformedToken)?;
    let payload_bytes = URL_SAFE_NO_PAD.decode(payload_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT payload base64");
        JwtValidationError::MalformedToken
    })?;

    match serde_json::from_slice::<Value>(&payload_bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => {
            tracing::debug!(target: "common.jwt", "JWT payload is not a JSON object");
            Err(JwtValidationError::MalformedToken)
        }
        Err(e) => {
            tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT payload JSON");
            Err(JwtValidationError::MalformedToken)
        }
    }
}

/// Read the `exp` claim (Unix seconds) WITHOUT verifying the signature.
///
/// Fractional values are truncated.
///
/// # Errors
///
/// The errors of [`decode_payload_unverified`], or `MissingExpiry` if `exp`
/// is absent or not a number.
pub fn extract_expiry(token: &str) -> Result<i64, JwtValidationError> {
    let payload = decode_payload_unverified(token)?;

    let exp = payload.get(CLAIM_EXP).ok_or(JwtValidationError::MissingExpiry)?;

    #[allow(clippy::cast_possible_truncation)]
    exp.as_i64()
        .or_else(|| exp.as_f64().map(|f| f as i64))
        .ok_or(JwtValidationError::MissingExpiry)
}

/// Validate the `iat` (issued-at) claim against `now` with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` past `now`.
pub fn validate_iat_at(iat: i64, clock_skew: Duration, now: i64) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds), well within i64 range
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
