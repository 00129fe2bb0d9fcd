//! Client-side bearer token cache.
//!
//! Holds at most one issued token and hands it out until its `exp` passes.
//! When the slot is empty or expired, one caller at a time refreshes it from
//! a [`TokenSource`] (normally [`HttpTokenSource`], which calls the identity
//! service's `POST /token`).
//!
//! # Refresh behaviour
//!
//! - Fast path: a fresh token is returned from a shared read of the slot, with
//!   no network I/O.
//! - Slow path: the caller takes the refresh lock and fetches. With
//!   [`RefreshStrategy::Coalesced`] (the default) the slot is re-checked after
//!   the lock is taken, so callers that queued behind a refresh reuse its
//!   result. [`RefreshStrategy::Serialized`] skips the re-check and every
//!   queued caller fetches in turn.
//! - The slot is only written after a complete fetch. Dropping a
//!   `get_token` future mid-refresh leaves the previous value in place.
//! - Waiting for the refresh lock has no timeout; callers that need one wrap
//!   `get_token` in `tokio::time::timeout`.
//!
//! # Example
//!
//! ```rust,ignore
//! use common::token_cache::{HttpTokenSource, TokenCache, TokenCacheConfig};
//! use std::sync::Arc;
//!
//! let config = TokenCacheConfig::new_secure(
//!     "https://id.marquee.example".to_string(),
//!     user_id,
//!     "someone@marquee.example".to_string(),
//! )?
//! .with_custom_claim("admin", true);
//!
//! let cache = TokenCache::new(Arc::new(HttpTokenSource::new(config)?));
//! let token = cache.get_token().await?;
//! let header = format!("Bearer {}", token.expose_secret());
//! ```
//!
//! # Security
//!
//! - Tokens are held as `SecretString` and never logged
//! - `exp` is read without verifying the signature; the cache only decides
//!   whether its own token is worth presenting

use crate::jwt::extract_expiry;
use crate::secret::{ExposeSecret, SecretString};
use crate::types::UserId;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, trace, warn};

// =============================================================================
// Constants
// =============================================================================

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout for HTTP client.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Path of the issuance endpoint, relative to the identity endpoint.
const TOKEN_PATH: &str = "/token";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while obtaining a token.
#[derive(Error, Debug, Clone)]
pub enum TokenError {
    /// Transport failure, server error or unexpected status.
    #[error("HTTP client error: {0}")]
    HttpError(String),

    /// Identity service refused the request (400, 401).
    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// Response body was not a usable token.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

// =============================================================================
// Configuration
// =============================================================================

/// Identity asserted when requesting tokens from the identity service.
#[derive(Clone)]
pub struct TokenCacheConfig {
    /// Identity service base URL (e.g., `http://localhost:8082`).
    pub identity_endpoint: String,

    /// Value of the `userid` claim.
    pub user_id: UserId,

    /// Value of the `sub` and `email` claims.
    pub email: String,

    /// Extra claims, sent as `customClaims`.
    pub custom_claims: BTreeMap<String, Value>,

    /// HTTP request timeout.
    pub http_timeout: Duration,
}

impl std::fmt::Debug for TokenCacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCacheConfig")
            .field("identity_endpoint", &self.identity_endpoint)
            .field("user_id", &self.user_id)
            .field("email", &"[REDACTED]")
            .field("custom_claims", &self.custom_claims.keys().collect::<Vec<_>>())
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl TokenCacheConfig {
    /// Create a new configuration with default timeouts and no custom claims.
    ///
    /// # Security Warning
    ///
    /// Issued tokens travel back over this connection. Use
    /// [`TokenCacheConfig::new_secure`] to enforce HTTPS.
    #[must_use]
    pub fn new(identity_endpoint: String, user_id: UserId, email: String) -> Self {
        Self {
            identity_endpoint,
            user_id,
            email,
            custom_claims: BTreeMap::new(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Create a new configuration requiring HTTPS.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if the URL doesn't use HTTPS.
    pub fn new_secure(
        identity_endpoint: String,
        user_id: UserId,
        email: String,
    ) -> Result<Self, TokenError> {
        if !identity_endpoint.starts_with("https://") {
            return Err(TokenError::Configuration(
                "Identity endpoint must use HTTPS in production".into(),
            ));
        }
        Ok(Self::new(identity_endpoint, user_id, email))
    }

    /// Add a custom claim to every token request.
    #[must_use]
    pub fn with_custom_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom_claims.insert(name.into(), value.into());
        self
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

// =============================================================================
// Token Source
// =============================================================================

/// Where fresh tokens come from.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Obtain a newly issued token.
    async fn fetch_token(&self) -> Result<SecretString, TokenError>;
}

/// Issuance request body, in the identity service's camelCase wire form.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IssueRequestBody<'a> {
    user_id: &'a UserId,
    email: &'a str,
    custom_claims: &'a BTreeMap<String, Value>,
}

/// [`TokenSource`] that calls `POST {identity_endpoint}/token`.
pub struct HttpTokenSource {
    config: TokenCacheConfig,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for HttpTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTokenSource")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpTokenSource {
    /// Build the source and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: TokenCacheConfig) -> Result<Self, TokenError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TokenError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    #[instrument(skip_all)]
    async fn fetch_token(&self) -> Result<SecretString, TokenError> {
        let url = format!(
            "{}{TOKEN_PATH}",
            self.config.identity_endpoint.trim_end_matches('/')
        );

        debug!(
            target: "common.token_cache",
            user_id = %self.config.user_id,
            url = %url,
            "Requesting token from identity service"
        );

        let body = IssueRequestBody {
            user_id: &self.config.user_id,
            email: &self.config.email,
            custom_claims: &self.config.custom_claims,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "common.token_cache", error = %e, "HTTP request failed");
                TokenError::HttpError(e.to_string())
            })?;

        let status = response.status();

        if status.is_success() {
            let text = response.text().await.map_err(|e| {
                warn!(target: "common.token_cache", error = %e, "Failed to read token response");
                TokenError::InvalidResponse(e.to_string())
            })?;
            parse_token_body(&text)
        } else if status.as_u16() == 401 || status.as_u16() == 400 {
            // Body is logged at trace level only
            let body = response.text().await.unwrap_or_else(|e| {
                trace!(target: "common.token_cache", error = %e, "Failed to read error response body");
                "<failed to read body>".to_string()
            });
            warn!(
                target: "common.token_cache",
                status = %status,
                "Token request rejected by identity service"
            );
            trace!(
                target: "common.token_cache",
                body = %body,
                "Token rejection response body"
            );
            Err(TokenError::AuthenticationRejected(format!(
                "Status {status}"
            )))
        } else if status.is_server_error() {
            warn!(
                target: "common.token_cache",
                status = %status,
                "Identity service returned server error"
            );
            Err(TokenError::HttpError(format!(
                "Identity service error: {status}"
            )))
        } else {
            warn!(
                target: "common.token_cache",
                status = %status,
                "Unexpected response from identity service"
            );
            Err(TokenError::HttpError(format!(
                "Unexpected status: {status}"
            )))
        }
    }
}

/// Accept the raw token text, or the same text as a JSON string literal.
fn parse_token_body(text: &str) -> Result<SecretString, TokenError> {
    let trimmed = text.trim();

    let token = if trimmed.starts_with('"') {
        serde_json::from_str::<String>(trimmed)
            .map_err(|e| TokenError::InvalidResponse(format!("Malformed quoted token: {e}")))?
    } else {
        trimmed.to_string()
    };

    if token.is_empty() {
        return Err(TokenError::InvalidResponse("Empty token".into()));
    }

    Ok(SecretString::from(token))
}

// =============================================================================
// Cache
// =============================================================================

/// How queued callers behave once they hold the refresh lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshStrategy {
    /// Re-check the slot and reuse a token refreshed while waiting.
    #[default]
    Coalesced,

    /// Always fetch, even if another caller just refreshed.
    Serialized,
}

/// The cached token and its `exp` (Unix seconds).
#[derive(Clone)]
pub struct CachedToken {
    token: SecretString,
    expires_at: i64,
}

impl CachedToken {
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Usable at `now` if it expires more than `margin_secs` later.
    #[must_use]
    pub fn is_fresh_at(&self, now: i64, margin_secs: i64) -> bool {
        now + margin_secs < self.expires_at
    }
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Single-slot token cache shared by all outbound requests of a client.
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    slot: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
    strategy: RefreshStrategy,
    refresh_margin: Duration,
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("strategy", &self.strategy)
            .field("refresh_margin", &self.refresh_margin)
            .finish_non_exhaustive()
    }
}

impl TokenCache {
    /// Empty cache with the coalesced strategy and no refresh margin.
    #[must_use]
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            slot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            strategy: RefreshStrategy::default(),
            refresh_margin: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: RefreshStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Treat tokens as expired this long before their `exp`.
    #[must_use]
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Return a token that has not yet expired, refreshing if needed.
    ///
    /// # Errors
    ///
    /// - The source's error if a refresh fails; the slot is left unchanged
    /// - `TokenError::InvalidResponse` if the fetched token has no readable `exp`
    #[instrument(skip_all)]
    pub async fn get_token(&self) -> Result<SecretString, TokenError> {
        if let Some(token) = self.fresh_token().await {
            trace!(target: "common.token_cache", "Serving cached token");
            return Ok(token);
        }

        let _refresh_guard = self.refresh_lock.lock().await;

        if self.strategy == RefreshStrategy::Coalesced {
            if let Some(token) = self.fresh_token().await {
                debug!(
                    target: "common.token_cache",
                    "Token refreshed by another caller while waiting"
                );
                return Ok(token);
            }
        }

        let token = self.source.fetch_token().await?;
        let expires_at = extract_expiry(token.expose_secret()).map_err(|e| {
            warn!(target: "common.token_cache", error = ?e, "Fetched token has no readable exp");
            TokenError::InvalidResponse("Token has no readable exp claim".into())
        })?;

        *self.slot.write().await = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });

        debug!(
            target: "common.token_cache",
            expires_at = expires_at,
            "Token refreshed"
        );

        Ok(token)
    }

    /// `exp` of the cached token, if any.
    pub async fn cached_expiry(&self) -> Option<i64> {
        self.slot.read().await.as_ref().map(CachedToken::expires_at)
    }

    async fn fresh_token(&self) -> Option<SecretString> {
        let now = chrono::Utc::now().timestamp();
        #[allow(clippy::cast_possible_wrap)]
        let margin_secs = self.refresh_margin.as_secs() as i64;

        self.slot
            .read()
            .await
            .as_ref()
            .filter(|cached| cached.is_fresh_at(now, margin_secs))
            .map(|cached| cached.token.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================
