//! Shared signing configuration for the issuer and the validator.
//!
//! Both sides of the token contract read the same three values. A
//! [`JwtSettings`] can only be built with all of them present and non-empty,
//! so a missing value surfaces at process start rather than per request.

use crate::secret::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Environment variable holding the HMAC signing secret.
pub const ENV_JWT_SECRET: &str = "JWT_SECRET";

/// Environment variable holding the expected/issued `iss` value.
pub const ENV_JWT_ISSUER: &str = "JWT_ISSUER";

/// Environment variable holding the expected/issued `aud` value.
pub const ENV_JWT_AUDIENCE: &str = "JWT_AUDIENCE";

/// Minimum signing secret length in bytes (256 bits for HS256).
pub const MIN_SIGNING_SECRET_BYTES: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwtSettingsError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Configuration value must not be empty: {0}")]
    EmptyValue(String),

    #[error("Signing secret too short: expected at least {min} bytes, got {actual}")]
    WeakSigningSecret { min: usize, actual: usize },
}

/// Symmetric signing settings: secret, issuer and audience.
#[derive(Clone)]
pub struct JwtSettings {
    secret: SecretString,
    issuer: String,
    audience: String,
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl JwtSettings {
    /// Build settings, rejecting empty values and short secrets.
    ///
    /// # Errors
    ///
    /// - `EmptyValue` if any of the three values is empty or whitespace
    /// - `WeakSigningSecret` if the secret is shorter than
    ///   [`MIN_SIGNING_SECRET_BYTES`]
    pub fn new(
        secret: SecretString,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, JwtSettingsError> {
        let issuer = issuer.into();
        let audience = audience.into();

        let secret_len = secret.expose_secret().len();
        if secret.expose_secret().trim().is_empty() {
            return Err(JwtSettingsError::EmptyValue(ENV_JWT_SECRET.to_string()));
        }
        if issuer.trim().is_empty() {
            return Err(JwtSettingsError::EmptyValue(ENV_JWT_ISSUER.to_string()));
        }
        if audience.trim().is_empty() {
            return Err(JwtSettingsError::EmptyValue(ENV_JWT_AUDIENCE.to_string()));
        }
        if secret_len < MIN_SIGNING_SECRET_BYTES {
            return Err(JwtSettingsError::WeakSigningSecret {
                min: MIN_SIGNING_SECRET_BYTES,
                actual: secret_len,
            });
        }

        Ok(Self {
            secret,
            issuer,
            audience,
        })
    }

    /// Load settings from a variable map (environment or test fixture).
    ///
    /// # Errors
    ///
    /// `MissingEnvVar` naming the first absent variable, otherwise the
    /// errors of [`JwtSettings::new`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, JwtSettingsError> {
        let required = |name: &str| {
            vars.get(name)
                .cloned()
                .ok_or_else(|| JwtSettingsError::MissingEnvVar(name.to_string()))
        };

        let secret = required(ENV_JWT_SECRET)?;
        let issuer = required(ENV_JWT_ISSUER)?;
        let audience = required(ENV_JWT_AUDIENCE)?;

        Self::new(SecretString::from(secret), issuer, audience)
    }

    /// The signing secret.
    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }
}
