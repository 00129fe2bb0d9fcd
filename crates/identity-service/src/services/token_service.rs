//! Token issuance.
//!
//! Builds the claim set for an identity assertion and signs it with HS256.
//! The issuer is stateless: nothing about issued tokens is recorded, and a
//! token's lifetime is only ever extended by issuing a new one.

use chrono::Utc;
use common::claims::{
    is_reserved_claim, ClaimValue, CLAIM_AUD, CLAIM_EMAIL, CLAIM_EXP, CLAIM_IAT, CLAIM_ISS,
    CLAIM_JTI, CLAIM_SUB, CLAIM_USER_ID,
};
use common::config::JwtSettings;
use common::jwt::TOKEN_LIFETIME;
use common::secret::ExposeSecret;
use common::types::UserId;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Identity assertion posted to `/token`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub user_id: UserId,
    pub email: String,
    #[serde(default)]
    pub custom_claims: BTreeMap<String, Value>,
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("user_id", &self.user_id)
            .field("email", &"[REDACTED]")
            .field("custom_claims", &self.custom_claims.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A signed token plus the values it was built from.
#[derive(Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: Uuid,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("jti", &self.jti)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IssueError {
    #[error("Custom claim '{0}' collides with a registered claim")]
    ReservedClaim(String),

    #[error("Custom claim names must not be empty")]
    InvalidClaimName,

    #[error("Invalid token request: {0}")]
    InvalidRequest(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// HS256 token issuer bound to one signing configuration.
#[derive(Clone)]
pub struct TokenIssuer {
    settings: JwtSettings,
    encoding_key: EncodingKey,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(settings: JwtSettings) -> Self {
        let encoding_key = EncodingKey::from_secret(settings.secret().expose_secret().as_bytes());
        Self {
            settings,
            encoding_key,
        }
    }

    /// Issue a token stamped with the current time.
    pub fn issue(&self, request: &TokenRequest) -> Result<IssuedToken, IssueError> {
        self.issue_at(request, Utc::now().timestamp())
    }

    /// Issue a token stamped with `now` (Unix seconds).
    pub fn issue_at(&self, request: &TokenRequest, now: i64) -> Result<IssuedToken, IssueError> {
        if request.email.trim().is_empty() {
            return Err(IssueError::InvalidRequest("email must not be empty".into()));
        }

        for name in request.custom_claims.keys() {
            if name.trim().is_empty() {
                return Err(IssueError::InvalidClaimName);
            }
            if is_reserved_claim(name) {
                return Err(IssueError::ReservedClaim(name.clone()));
            }
        }

        let jti = Uuid::new_v4();
        #[allow(clippy::cast_possible_wrap)]
        let expires_at = now + TOKEN_LIFETIME.as_secs() as i64;

        let mut payload = Map::new();
        payload.insert(CLAIM_JTI.into(), Value::String(jti.to_string()));
        payload.insert(CLAIM_SUB.into(), Value::String(request.email.clone()));
        payload.insert(CLAIM_EMAIL.into(), Value::String(request.email.clone()));
        payload.insert(CLAIM_USER_ID.into(), Value::String(request.user_id.to_string()));

        for (name, value) in &request.custom_claims {
            let typed = ClaimValue::from_json(value.clone());
            payload.insert(name.clone(), typed.to_json());
        }

        payload.insert(CLAIM_ISS.into(), Value::String(self.settings.issuer().to_string()));
        payload.insert(CLAIM_AUD.into(), Value::String(self.settings.audience().to_string()));
        payload.insert(CLAIM_IAT.into(), Value::from(now));
        payload.insert(CLAIM_EXP.into(), Value::from(expires_at));

        let token = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(|e| {
                tracing::error!(target: "identity.token", error = %e, "Failed to sign token");
                IssueError::Signing(e.to_string())
            })?;

        tracing::debug!(
            target: "identity.token",
            jti = %jti,
            user_id = %request.user_id,
            custom_claims = request.custom_claims.len(),
            expires_at = expires_at,
            "Token issued"
        );

        Ok(IssuedToken {
            token,
            jti,
            issued_at: now,
            expires_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::SecretString;
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use std::collections::HashSet;

    const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";
    const TEST_USER: &str = "45a57255-29c6-43d8-b17a-4e65698bd182";

    fn test_issuer() -> TokenIssuer {
        TokenIssuer::new(
            JwtSettings::new(
                SecretString::from(TEST_SECRET),
                "https://id.marquee.test",
                "https://movies.marquee.test",
            )
            .unwrap(),
        )
    }

    fn test_request() -> TokenRequest {
        TokenRequest {
            user_id: TEST_USER.parse().unwrap(),
            email: "someone@marquee.test".to_string(),
            custom_claims: BTreeMap::new(),
        }
    }

    fn decode_payload(token: &str) -> Map<String, Value> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_audience(&["https://movies.marquee.test"]);
        validation.set_issuer(&["https://id.marquee.test"]);
        decode::<Map<String, Value>>(
            token,
            &DecodingKey::from_secret(TEST_SECRET.as_bytes()),
            &validation,
        )
        .unwrap()
        .claims
    }

    #[test]
    fn test_issue_at_canonical_claims() {
        let now = 1_700_000_000;
        let issued = test_issuer().issue_at(&test_request(), now).unwrap();
        let payload = decode_payload(&issued.token);

        assert_eq!(payload["jti"], Value::String(issued.jti.to_string()));
        assert_eq!(payload["sub"], "someone@marquee.test");
        assert_eq!(payload["email"], "someone@marquee.test");
        assert_eq!(payload["userid"], TEST_USER);
        assert_eq!(payload["iss"], "https://id.marquee.test");
        assert_eq!(payload["aud"], "https://movies.marquee.test");
        assert_eq!(payload["iat"], now);
        assert_eq!(payload["exp"], now + 43_200);
        assert_eq!(issued.issued_at, now);
        assert_eq!(issued.expires_at, now + 43_200);
    }

    #[test]
    fn test_header_is_hs256_jwt() {
        let issued = test_issuer().issue(&test_request()).unwrap();
        let header = jsonwebtoken::decode_header(&issued.token).unwrap();

        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_custom_claims_keep_their_kind() {
        let mut request = test_request();
        request.custom_claims.insert("admin".into(), Value::Bool(true));
        request.custom_claims.insert("tier".into(), serde_json::json!(3));
        request.custom_claims.insert("region".into(), Value::String("eu".into()));

        let issued = test_issuer().issue(&request).unwrap();
        let payload = decode_payload(&issued.token);

        assert_eq!(payload["admin"], Value::Bool(true));
        assert_eq!(payload["tier"], serde_json::json!(3));
        assert_eq!(payload["region"], Value::String("eu".into()));
    }

    #[test]
    fn test_non_scalar_custom_claim_becomes_text() {
        let mut request = test_request();
        request
            .custom_claims
            .insert("prefs".into(), serde_json::json!({"genre": "noir"}));

        let issued = test_issuer().issue(&request).unwrap();
        let payload = decode_payload(&issued.token);

        assert_eq!(payload["prefs"], Value::String(r#"{"genre":"noir"}"#.into()));
    }

    #[test]
    fn test_reserved_custom_claim_rejected() {
        for name in ["sub", "userid", "exp", "iss"] {
            let mut request = test_request();
            request.custom_claims.insert(name.into(), Value::Bool(true));

            assert_eq!(
                test_issuer().issue(&request).unwrap_err(),
                IssueError::ReservedClaim(name.to_string())
            );
        }
    }

    #[test]
    fn test_empty_custom_claim_name_rejected() {
        let mut request = test_request();
        request.custom_claims.insert(" ".into(), Value::Bool(true));

        assert_eq!(
            test_issuer().issue(&request).unwrap_err(),
            IssueError::InvalidClaimName
        );
    }

    #[test]
    fn test_empty_email_rejected() {
        let mut request = test_request();
        request.email = String::new();

        assert!(matches!(
            test_issuer().issue(&request),
            Err(IssueError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_jti_unique_across_issuances() {
        let issuer = test_issuer();
        let request = test_request();

        let jtis: HashSet<Uuid> = (0..1000)
            .map(|_| issuer.issue_at(&request, 1_700_000_000).unwrap().jti)
            .collect();

        assert_eq!(jtis.len(), 1000);
    }

    #[test]
    fn test_token_request_wire_format() {
        let json = serde_json::json!({
            "userId": TEST_USER,
            "email": "someone@marquee.test",
            "customClaims": { "admin": true }
        });

        let request: TokenRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.user_id.to_string(), TEST_USER);
        assert_eq!(request.custom_claims.get("admin"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_token_request_custom_claims_optional() {
        let json = serde_json::json!({ "userId": TEST_USER, "email": "a@b.c" });

        let request: TokenRequest = serde_json::from_value(json).unwrap();
        assert!(request.custom_claims.is_empty());
    }

    #[test]
    fn test_debug_redacts_token_and_email() {
        let issued = test_issuer().issue(&test_request()).unwrap();
        let issued_debug = format!("{issued:?}");
        assert!(!issued_debug.contains(&issued.token));

        let request_debug = format!("{:?}", test_request());
        assert!(!request_debug.contains("someone@marquee.test"));

        let issuer_debug = format!("{:?}", test_issuer());
        assert!(!issuer_debug.contains(TEST_SECRET));
    }
}
