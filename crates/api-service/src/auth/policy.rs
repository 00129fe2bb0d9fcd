//! Authorization policies.
//!
//! A policy looks at a validated [`Principal`] (and, for `AdminOnly`, the
//! request headers) and returns a [`PolicyDecision`]. Decisions never mutate
//! the principal. A successful decision may carry additional claims, which
//! the caller merges into a new principal with [`PolicyDecision::merge_into`].
//!
//! # AdminOnly
//!
//! 1. An admin claim equal to `"true"` succeeds immediately
//! 2. Otherwise the elevation header must be present and equal the admin key
//! 3. On a match the key owner is resolved and added as a `userid` claim
//!
//! # TrustedMember
//!
//! Succeeds if an admin or trusted-member claim equals `"true"`.

use crate::auth::key_owner::KeyOwnerResolver;
use crate::observability::metrics::record_policy_decision;
use axum::http::{HeaderMap, HeaderValue};
use common::claims::{Claim, Principal, CLAIM_USER_ID};
use common::secret::{ExposeSecret, SecretString};
use ring::hmac;
use ring::rand::SystemRandom;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Claim names that mark an administrator.
pub const ADMIN_CLAIM_NAMES: [&str; 2] = ["is_admin", "admin"];

/// Claim names that mark a trusted member.
pub const TRUSTED_MEMBER_CLAIM_NAMES: [&str; 2] = ["is_trusted_member", "trusted_member"];

const CLAIM_TRUE: &str = "true";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    AdminOnly,
    TrustedMember,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::AdminOnly => "admin_only",
            Policy::TrustedMember => "trusted_member",
        }
    }
}

/// Why a policy failed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    #[error("Request context is unavailable")]
    NoTransportContext,

    #[error("Elevation header is missing")]
    MissingElevationHeader,

    #[error("Elevation key is not valid")]
    ElevationKeyMismatch,

    #[error("Elevation key owner could not be resolved")]
    OwnerLookupFailed,

    #[error("Caller is not a trusted member")]
    NotTrustedMember,
}

impl FailureReason {
    /// Stable label for logs and metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            FailureReason::NoTransportContext => "no_transport_context",
            FailureReason::MissingElevationHeader => "missing_elevation_header",
            FailureReason::ElevationKeyMismatch => "elevation_key_mismatch",
            FailureReason::OwnerLookupFailed => "owner_lookup_failed",
            FailureReason::NotTrustedMember => "not_trusted_member",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeed,
    Fail(FailureReason),
}

/// Result of evaluating one policy. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    outcome: Outcome,
    additional_claims: Vec<Claim>,
}

impl PolicyDecision {
    pub fn succeed() -> Self {
        Self {
            outcome: Outcome::Succeed,
            additional_claims: Vec::new(),
        }
    }

    pub fn succeed_with(additional_claims: Vec<Claim>) -> Self {
        Self {
            outcome: Outcome::Succeed,
            additional_claims,
        }
    }

    pub fn fail(reason: FailureReason) -> Self {
        Self {
            outcome: Outcome::Fail(reason),
            additional_claims: Vec::new(),
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Succeed
    }

    pub fn additional_claims(&self) -> &[Claim] {
        &self.additional_claims
    }

    /// Principal with this decision's claims appended. Claims already
    /// present (same type and value) are not duplicated.
    pub fn merge_into(&self, principal: Principal) -> Principal {
        principal.with_claims(self.additional_claims.iter().cloned())
    }

    fn outcome_label(&self) -> &'static str {
        match self.outcome {
            Outcome::Succeed => "succeed",
            Outcome::Fail(reason) => reason.as_label(),
        }
    }
}

/// Read-only view of the request headers.
///
/// Values are raw bytes: a header that is present but not visible ASCII is
/// still present.
pub trait HeaderSource: Send + Sync {
    fn header(&self, name: &str) -> Option<&[u8]>;
}

impl HeaderSource for HeaderMap {
    fn header(&self, name: &str) -> Option<&[u8]> {
        self.get(name).map(HeaderValue::as_bytes)
    }
}

#[derive(Debug, Error)]
#[error("Failed to initialize admin key comparison")]
pub struct AdminKeyError;

/// The configured admin key, held only as an HMAC tag.
///
/// Comparison goes through `hmac::verify`, which runs in constant time with
/// respect to the presented value. The HMAC key is random per process.
pub struct AdminKey {
    key: hmac::Key,
    tag: hmac::Tag,
}

impl fmt::Debug for AdminKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminKey([REDACTED])")
    }
}

impl AdminKey {
    /// # Errors
    ///
    /// `AdminKeyError` if the system RNG fails.
    pub fn new(admin_key: &SecretString) -> Result<Self, AdminKeyError> {
        let rng = SystemRandom::new();
        let key = hmac::Key::generate(hmac::HMAC_SHA256, &rng).map_err(|_| AdminKeyError)?;
        let tag = hmac::sign(&key, admin_key.expose_secret().as_bytes());
        Ok(Self { key, tag })
    }

    pub fn matches(&self, presented: impl AsRef<[u8]>) -> bool {
        hmac::verify(&self.key, presented.as_ref(), self.tag.as_ref()).is_ok()
    }
}

/// Evaluates authorization policies.
pub struct PolicyEngine {
    admin_key: AdminKey,
    header_name: String,
    owner_resolver: Arc<dyn KeyOwnerResolver>,
}

impl fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("admin_key", &self.admin_key)
            .field("header_name", &self.header_name)
            .finish_non_exhaustive()
    }
}

impl PolicyEngine {
    pub fn new(
        admin_key: AdminKey,
        header_name: impl Into<String>,
        owner_resolver: Arc<dyn KeyOwnerResolver>,
    ) -> Self {
        Self {
            admin_key,
            header_name: header_name.into(),
            owner_resolver,
        }
    }

    /// Name of the elevation header.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Constant-time check of a presented key against the admin key.
    pub fn matches_admin_key(&self, presented: impl AsRef<[u8]>) -> bool {
        self.admin_key.matches(presented)
    }

    /// Evaluate `policy` and record the outcome.
    #[instrument(skip_all, name = "api.auth.policy", fields(policy = policy.as_str()))]
    pub async fn evaluate(
        &self,
        policy: Policy,
        principal: &Principal,
        transport: Option<&dyn HeaderSource>,
    ) -> PolicyDecision {
        let decision = match policy {
            Policy::AdminOnly => self.admin_only(principal, transport).await,
            Policy::TrustedMember => Self::trusted_member(principal),
        };

        record_policy_decision(policy.as_str(), decision.outcome_label());
        tracing::debug!(
            target: "api.auth.policy",
            policy = policy.as_str(),
            outcome = decision.outcome_label(),
            "Policy evaluated"
        );

        decision
    }

    pub async fn admin_only(
        &self,
        principal: &Principal,
        transport: Option<&dyn HeaderSource>,
    ) -> PolicyDecision {
        if has_admin_claim(principal) {
            return PolicyDecision::succeed();
        }

        let Some(headers) = transport else {
            return PolicyDecision::fail(FailureReason::NoTransportContext);
        };

        let Some(presented) = headers.header(&self.header_name) else {
            return PolicyDecision::fail(FailureReason::MissingElevationHeader);
        };

        if !self.admin_key.matches(presented) {
            return PolicyDecision::fail(FailureReason::ElevationKeyMismatch);
        }
        // A matching value equals the configured key, so it is UTF-8
        let Ok(presented) = std::str::from_utf8(presented) else {
            return PolicyDecision::fail(FailureReason::ElevationKeyMismatch);
        };

        match self.owner_resolver.resolve_owner(presented).await {
            Ok(owner) => PolicyDecision::succeed_with(vec![Claim::text(
                CLAIM_USER_ID,
                owner.to_string(),
            )]),
            Err(e) => {
                tracing::warn!(target: "api.auth.policy", error = %e, "Admin key owner lookup failed");
                PolicyDecision::fail(FailureReason::OwnerLookupFailed)
            }
        }
    }

    pub fn trusted_member(principal: &Principal) -> PolicyDecision {
        if has_admin_claim(principal)
            || has_true_claim(principal, &TRUSTED_MEMBER_CLAIM_NAMES)
        {
            PolicyDecision::succeed()
        } else {
            PolicyDecision::fail(FailureReason::NotTrustedMember)
        }
    }
}

/// True if the principal carries an admin claim set to `"true"`.
pub fn has_admin_claim(principal: &Principal) -> bool {
    has_true_claim(principal, &ADMIN_CLAIM_NAMES)
}

fn has_true_claim(principal: &Principal, names: &[&str]) -> bool {
    names.iter().any(|name| principal.has_claim(name, CLAIM_TRUE))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::key_owner::{OwnerLookupError, StaticKeyOwner, PLACEHOLDER_OWNER};
    use async_trait::async_trait;
    use common::claims::ClaimValue;
    use common::types::UserId;

    const ADMIN_KEY: &str = "admin-key-42";

    struct UnavailableOwner;

    #[async_trait]
    impl KeyOwnerResolver for UnavailableOwner {
        async fn resolve_owner(&self, _key: &str) -> Result<UserId, OwnerLookupError> {
            Err(OwnerLookupError::Unavailable("directory down".to_string()))
        }
    }

    /// Counts header lookups.
    struct CountingHeaders {
        inner: HeaderMap,
        lookups: std::sync::atomic::AtomicUsize,
    }

    impl HeaderSource for CountingHeaders {
        fn header(&self, name: &str) -> Option<&[u8]> {
            self.lookups
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.header(name)
        }
    }

    fn engine_with(resolver: Arc<dyn KeyOwnerResolver>) -> PolicyEngine {
        let key = AdminKey::new(&SecretString::from(ADMIN_KEY)).unwrap();
        PolicyEngine::new(key, "x-api-key", resolver)
    }

    fn engine() -> PolicyEngine {
        engine_with(Arc::new(StaticKeyOwner::placeholder()))
    }

    fn headers(key: Option<&'static str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(key) = key {
            map.insert("x-api-key", HeaderValue::from_static(key));
        }
        map
    }

    fn regular_user() -> Principal {
        Principal::from_claims(vec![
            Claim::text("email", "someone@marquee.test"),
            Claim::text("userid", "45a57255-29c6-43d8-b17a-4e65698bd182"),
        ])
    }

    fn with_flag(name: &str, value: bool) -> Principal {
        regular_user().with_claims([Claim::new(name, &ClaimValue::from(value))])
    }

    #[tokio::test]
    async fn test_admin_claim_succeeds_without_headers() {
        for name in ADMIN_CLAIM_NAMES {
            let decision = engine()
                .evaluate(Policy::AdminOnly, &with_flag(name, true), None)
                .await;

            assert!(decision.is_success(), "claim {name}");
            assert!(decision.additional_claims().is_empty());
        }
    }

    #[tokio::test]
    async fn test_admin_claim_skips_header_lookup() {
        let spy = CountingHeaders {
            inner: headers(Some("admin-key-wrong")),
            lookups: std::sync::atomic::AtomicUsize::new(0),
        };

        let decision = engine()
            .evaluate(Policy::AdminOnly, &with_flag("is_admin", true), Some(&spy))
            .await;

        assert!(decision.is_success());
        assert_eq!(spy.lookups.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_elevation_adds_user_id_when_absent() {
        let map = headers(Some(ADMIN_KEY));
        let bare = Principal::from_claims(vec![Claim::text("email", "someone@marquee.test")]);

        let decision = engine()
            .evaluate(Policy::AdminOnly, &bare, Some(&map))
            .await;
        let merged = decision.merge_into(bare);

        assert!(merged.has_claim("userid", &PLACEHOLDER_OWNER.to_string()));
    }

    #[tokio::test]
    async fn test_admin_claim_false_is_not_admin() {
        let decision = engine()
            .evaluate(Policy::AdminOnly, &with_flag("admin", false), None)
            .await;

        assert_eq!(
            decision.outcome(),
            Outcome::Fail(FailureReason::NoTransportContext)
        );
    }

    #[tokio::test]
    async fn test_missing_elevation_header() {
        let map = headers(None);
        let decision = engine()
            .evaluate(Policy::AdminOnly, &regular_user(), Some(&map))
            .await;

        assert_eq!(
            decision.outcome(),
            Outcome::Fail(FailureReason::MissingElevationHeader)
        );
    }

    #[tokio::test]
    async fn test_wrong_elevation_key() {
        let map = headers(Some("admin-key-43"));
        let decision = engine()
            .evaluate(Policy::AdminOnly, &regular_user(), Some(&map))
            .await;

        assert_eq!(
            decision.outcome(),
            Outcome::Fail(FailureReason::ElevationKeyMismatch)
        );
    }

    #[tokio::test]
    async fn test_non_ascii_elevation_value_is_a_mismatch() {
        let mut map = HeaderMap::new();
        map.insert("x-api-key", HeaderValue::from_bytes(b"admin-key-\xff").unwrap());

        let decision = engine()
            .evaluate(Policy::AdminOnly, &regular_user(), Some(&map))
            .await;

        assert_eq!(
            decision.outcome(),
            Outcome::Fail(FailureReason::ElevationKeyMismatch)
        );
    }

    #[tokio::test]
    async fn test_matching_key_adds_owner_claim() {
        let map = headers(Some(ADMIN_KEY));
        let decision = engine()
            .evaluate(Policy::AdminOnly, &regular_user(), Some(&map))
            .await;

        assert!(decision.is_success());
        assert_eq!(
            decision.additional_claims(),
            &[Claim::text("userid", PLACEHOLDER_OWNER.to_string())]
        );
    }

    #[tokio::test]
    async fn test_owner_lookup_failure_fails_policy() {
        let map = headers(Some(ADMIN_KEY));
        let decision = engine_with(Arc::new(UnavailableOwner))
            .evaluate(Policy::AdminOnly, &regular_user(), Some(&map))
            .await;

        assert_eq!(
            decision.outcome(),
            Outcome::Fail(FailureReason::OwnerLookupFailed)
        );
        assert!(decision.additional_claims().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_elevation_merges_once() {
        let engine = engine();
        let map = headers(Some(ADMIN_KEY));
        let original = regular_user();

        let first = engine
            .evaluate(Policy::AdminOnly, &original, Some(&map))
            .await;
        let merged = first.merge_into(original.clone());
        let second = engine.evaluate(Policy::AdminOnly, &merged, Some(&map)).await;
        let merged = second.merge_into(merged);

        assert_eq!(merged.len(), original.len() + 1);
        assert_eq!(
            merged.find_all("userid").count(),
            2,
            "token userid plus one elevation claim"
        );
        assert_eq!(
            merged.last("userid").unwrap().value,
            PLACEHOLDER_OWNER.to_string()
        );
    }

    #[tokio::test]
    async fn test_decision_does_not_touch_principal() {
        let map = headers(Some(ADMIN_KEY));
        let principal = regular_user();
        let before = principal.clone();

        let _ = engine()
            .evaluate(Policy::AdminOnly, &principal, Some(&map))
            .await;

        assert_eq!(principal, before);
    }

    #[test]
    fn test_trusted_member_claims() {
        for name in TRUSTED_MEMBER_CLAIM_NAMES.iter().chain(ADMIN_CLAIM_NAMES.iter()) {
            assert!(
                PolicyEngine::trusted_member(&with_flag(name, true)).is_success(),
                "claim {name}"
            );
        }
    }

    #[test]
    fn test_trusted_member_rejects_regular_user() {
        assert_eq!(
            PolicyEngine::trusted_member(&regular_user()).outcome(),
            Outcome::Fail(FailureReason::NotTrustedMember)
        );
        assert!(!PolicyEngine::trusted_member(&with_flag("trusted_member", false)).is_success());
    }

    #[test]
    fn test_admin_key_matches() {
        let key = AdminKey::new(&SecretString::from(ADMIN_KEY)).unwrap();
        assert!(key.matches(ADMIN_KEY));
        assert!(!key.matches("admin-key-4"));
        assert!(!key.matches(""));
        assert!(!format!("{key:?}").contains(ADMIN_KEY));
    }
}
