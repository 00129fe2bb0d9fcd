//! API service configuration.
//!
//! Loaded once at startup. Any missing or invalid value is fatal.

use axum::http::HeaderName;
use common::config::{JwtSettings, JwtSettingsError};
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default bind address for the HTTP server.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default header carrying the elevation key.
pub const DEFAULT_API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct Config {
    /// HTTP server bind address.
    pub bind_address: String,

    /// Shared signing configuration (same values as the identity service).
    pub jwt: JwtSettings,

    /// Admin key accepted in the elevation header.
    pub admin_api_key: SecretString,

    /// Name of the elevation header, lowercase.
    pub api_key_header: String,

    /// Tolerance for `iat` values in the future.
    pub jwt_clock_skew: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("jwt", &self.jwt)
            .field("admin_api_key", &"[REDACTED]")
            .field("api_key_header", &self.api_key_header)
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Configuration value must not be empty: {0}")]
    EmptyValue(String),

    #[error("Signing secret too short: expected at least {min} bytes, got {actual}")]
    WeakSigningSecret { min: usize, actual: usize },

    #[error("Invalid JWT clock skew: {0}")]
    InvalidClockSkew(String),

    #[error("Invalid API key header name: {0}")]
    InvalidHeaderName(String),
}

impl From<JwtSettingsError> for ConfigError {
    fn from(err: JwtSettingsError) -> Self {
        match err {
            JwtSettingsError::MissingEnvVar(name) => ConfigError::MissingEnvVar(name),
            JwtSettingsError::EmptyValue(name) => ConfigError::EmptyValue(name),
            JwtSettingsError::WeakSigningSecret { min, actual } => {
                ConfigError::WeakSigningSecret { min, actual }
            }
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let jwt = JwtSettings::from_vars(vars)?;

        let admin_api_key = vars
            .get("ADMIN_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("ADMIN_API_KEY".to_string()))?;
        if admin_api_key.trim().is_empty() {
            return Err(ConfigError::EmptyValue("ADMIN_API_KEY".to_string()));
        }
        let admin_api_key = SecretString::from(admin_api_key.clone());

        let api_key_header = vars
            .get("API_KEY_HEADER")
            .map(|h| h.trim().to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string());
        if HeaderName::from_bytes(api_key_header.as_bytes()).is_err() {
            return Err(ConfigError::InvalidHeaderName(format!(
                "API_KEY_HEADER is not a valid header name: '{}'",
                api_key_header
            )));
        }

        let jwt_clock_skew = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            #[allow(clippy::cast_sign_loss)]
            let skew = Duration::from_secs(value as u64);
            if skew > MAX_CLOCK_SKEW {
                return Err(ConfigError::InvalidClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }
            skew
        } else {
            DEFAULT_CLOCK_SKEW
        };

        Ok(Config {
            bind_address,
            jwt,
            admin_api_key,
            api_key_header,
            jwt_clock_skew,
        })
    }

    /// Length of the configured admin key, for startup logging.
    pub fn admin_api_key_len(&self) -> usize {
        self.admin_api_key.expose_secret().len()
    }
}
