use common::config::{JwtSettings, JwtSettingsError};
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default bind address for the issuance endpoint.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8082";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub jwt: JwtSettings,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Configuration value must not be empty: {0}")]
    EmptyValue(String),

    #[error("Signing secret too short: expected at least {min} bytes, got {actual}")]
    WeakSigningSecret { min: usize, actual: usize },
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
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let jwt = JwtSettings::from_vars(vars)?;

        Ok(Config { bind_address, jwt })
    }
}
