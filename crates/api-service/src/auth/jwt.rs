//! Bearer token validation.
//!
//! Turns a presented token into a [`Principal`] or a [`TokenValidationError`].
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only HS256 is accepted, with the shared signing secret
//! - Issuer and audience must match the configured values exactly
//! - A token is valid while `now < exp`; `iat` may be at most `clock_skew`
//!   in the future
//! - Every failure displays the same generic message; the variant is logged

use common::claims::{Principal, CLAIM_AUD, CLAIM_EXP, CLAIM_IAT, CLAIM_ISS};
use common::config::JwtSettings;
use common::jwt::{validate_iat_at, MAX_JWT_SIZE_BYTES};
use common::secret::ExposeSecret;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    #[error("The access token is invalid or expired")]
    Malformed,

    #[error("The access token is invalid or expired")]
    SignatureMismatch,

    #[error("The access token is invalid or expired")]
    Expired,

    #[error("The access token is invalid or expired")]
    IssuerMismatch,

    #[error("The access token is invalid or expired")]
    AudienceMismatch,

    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

impl TokenValidationError {
    /// Stable label for logs and metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::TokenTooLarge => "token_too_large",
            Self::Malformed => "malformed",
            Self::SignatureMismatch => "signature_mismatch",
            Self::Expired => "expired",
            Self::IssuerMismatch => "issuer_mismatch",
            Self::AudienceMismatch => "audience_mismatch",
            Self::IatTooFarInFuture => "iat_too_far_in_future",
        }
    }
}

/// HS256 validator bound to one signing configuration.
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
    clock_skew: Duration,
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("decoding_key", &"[REDACTED]")
            .field("issuer", &self.validation.iss)
            .field("audience", &self.validation.aud)
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

impl TokenValidator {
    pub fn new(settings: &JwtSettings, clock_skew: Duration) -> Self {
        let decoding_key = DecodingKey::from_secret(settings.secret().expose_secret().as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        // Lifetime is checked against an explicit `now` in `validate_at`
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&[CLAIM_EXP, CLAIM_ISS, CLAIM_AUD]);
        validation.set_issuer(&[settings.issuer()]);
        validation.set_audience(&[settings.audience()]);

        Self {
            decoding_key,
            validation,
            clock_skew,
        }
    }

    /// Validate against the current wall clock.
    ///
    /// # Errors
    ///
    /// See [`TokenValidator::validate_at`].
    pub fn validate(&self, token: &str) -> Result<Principal, TokenValidationError> {
        self.validate_at(token, chrono::Utc::now().timestamp())
    }

    /// Validate a token as of `now` (Unix seconds).
    ///
    /// # Security Checks
    ///
    /// 1. Size check - reject tokens > 8KB before parsing
    /// 2. Verify HS256 signature, issuer and audience
    /// 3. Require `now < exp`
    /// 4. Validate `iat` with clock skew tolerance
    ///
    /// # Errors
    ///
    /// One `TokenValidationError` variant per failed check.
    #[instrument(skip_all, name = "api.auth.jwt.validate")]
    pub fn validate_at(&self, token: &str, now: i64) -> Result<Principal, TokenValidationError> {
        if token.len() > MAX_JWT_SIZE_BYTES {
            tracing::debug!(
                target: "api.auth.jwt",
                token_size = token.len(),
                max_size = MAX_JWT_SIZE_BYTES,
                "Token rejected: size exceeds maximum allowed"
            );
            return Err(TokenValidationError::TokenTooLarge);
        }

        let token_data = decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                let err = match e.kind() {
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        TokenValidationError::SignatureMismatch
                    }
                    ErrorKind::InvalidIssuer => TokenValidationError::IssuerMismatch,
                    ErrorKind::InvalidAudience => TokenValidationError::AudienceMismatch,
                    _ => TokenValidationError::Malformed,
                };
                tracing::debug!(
                    target: "api.auth.jwt",
                    error = %e,
                    reason = err.as_label(),
                    "Token verification failed"
                );
                err
            })?;
        let payload = token_data.claims;

        let exp = numeric_claim(&payload, CLAIM_EXP).ok_or_else(|| {
            tracing::debug!(target: "api.auth.jwt", "Token rejected: exp is not numeric");
            TokenValidationError::Malformed
        })?;
        if now >= exp {
            tracing::debug!(target: "api.auth.jwt", exp = exp, now = now, "Token rejected: expired");
            return Err(TokenValidationError::Expired);
        }

        if let Some(iat_value) = payload.get(CLAIM_IAT) {
            let iat = as_seconds(iat_value).ok_or_else(|| {
                tracing::debug!(target: "api.auth.jwt", "Token rejected: iat is not numeric");
                TokenValidationError::Malformed
            })?;
            validate_iat_at(iat, self.clock_skew, now)
                .map_err(|_| TokenValidationError::IatTooFarInFuture)?;
        }

        let principal = Principal::from_payload(&payload);
        tracing::debug!(
            target: "api.auth.jwt",
            claim_count = principal.len(),
            "Token validated successfully"
        );
        Ok(principal)
    }
}

fn numeric_claim(payload: &Map<String, Value>, name: &str) -> Option<i64> {
    payload.get(name).and_then(as_seconds)
}

/// Unix seconds from a JSON number; fractions are truncated.
fn as_seconds(value: &Value) -> Option<i64> {
    #[allow(clippy::cast_possible_truncation)]
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}
