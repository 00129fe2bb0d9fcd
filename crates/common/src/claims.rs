//! Claim and principal types shared by the issuer and the API edge.
//!
//! A [`Claim`] is a `(type, value, kind)` triple. Values are always kept as
//! text (booleans as `"true"`/`"false"`), with [`ClaimKind`] recording how the
//! value travels in the JWT payload. Kinds are resolved once, when a value is
//! first seen as JSON, and never re-inspected afterwards.
//!
//! A [`Principal`] is the ordered claim list materialized from one validated
//! token. It has no in-place mutators: [`Principal::with_claims`] consumes the
//! principal and returns a new one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

// =============================================================================
// Wire Claim Names
// =============================================================================

/// Unique token identifier.
pub const CLAIM_JTI: &str = "jti";

/// Subject; carries the email address.
pub const CLAIM_SUB: &str = "sub";

/// Email address.
pub const CLAIM_EMAIL: &str = "email";

/// Canonical user identifier (hyphenated UUID).
pub const CLAIM_USER_ID: &str = "userid";

pub const CLAIM_ISS: &str = "iss";
pub const CLAIM_AUD: &str = "aud";
pub const CLAIM_IAT: &str = "iat";
pub const CLAIM_EXP: &str = "exp";
pub const CLAIM_NBF: &str = "nbf";

/// Names that callers cannot supply as custom claims.
pub const RESERVED_CLAIM_NAMES: [&str; 9] = [
    CLAIM_JTI,
    CLAIM_SUB,
    CLAIM_EMAIL,
    CLAIM_USER_ID,
    CLAIM_ISS,
    CLAIM_AUD,
    CLAIM_IAT,
    CLAIM_EXP,
    CLAIM_NBF,
];

/// Returns true if `name` is a registered claim owned by the issuer.
#[must_use]
pub fn is_reserved_claim(name: &str) -> bool {
    RESERVED_CLAIM_NAMES.contains(&name)
}

// =============================================================================
// Claim Kinds and Values
// =============================================================================

/// How a claim value is represented in the token payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimKind {
    Bool,
    Number,
    Text,
}

/// A typed claim value, resolved once from untyped input.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    Bool(bool),
    Number(Number),
    Text(String),
}

impl ClaimValue {
    /// Resolve the kind of an untyped JSON value.
    ///
    /// Booleans and numbers keep their kind; strings are taken as-is and
    /// anything else (arrays, objects, null) becomes its JSON text.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::Text(s),
            other => Self::Text(other.to_string()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ClaimKind {
        match self {
            Self::Bool(_) => ClaimKind::Bool,
            Self::Number(_) => ClaimKind::Number,
            Self::Text(_) => ClaimKind::Text,
        }
    }

    /// Text form stored on a [`Claim`].
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    /// JSON form written into the token payload.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<bool> for ClaimValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ClaimValue {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

// =============================================================================
// Claim
// =============================================================================

/// A `(type, value, kind)` triple asserted about a principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
    pub kind: ClaimKind,
}

impl Claim {
    /// Build a claim from a typed value.
    #[must_use]
    pub fn new(claim_type: impl Into<String>, value: &ClaimValue) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.to_text(),
            kind: value.kind(),
        }
    }

    /// Build a text-kind claim.
    #[must_use]
    pub fn text(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
            kind: ClaimKind::Text,
        }
    }

    /// Returns true if this claim has exactly the given type and value.
    #[must_use]
    pub fn is(&self, claim_type: &str, value: &str) -> bool {
        self.claim_type == claim_type && self.value == value
    }

    /// Same type and value, kind ignored.
    fn same_assertion(&self, other: &Claim) -> bool {
        self.is(&other.claim_type, &other.value)
    }
}

// =============================================================================
// Principal
// =============================================================================

/// The ordered claim set derived from validating one token.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Principal {
    claims: Vec<Claim>,
}

/// Lists claim types only; values may carry identifiers.
impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<&str> = self.claims.iter().map(|c| c.claim_type.as_str()).collect();
        f.debug_struct("Principal")
            .field("claim_types", &types)
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl Principal {
    #[must_use]
    pub fn from_claims(claims: Vec<Claim>) -> Self {
        Self { claims }
    }

    /// Materialize a principal from a decoded JWT payload.
    ///
    /// Every entry becomes a claim. Arrays yield one claim per element under
    /// the same type; `null` entries are skipped.
    #[must_use]
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        let mut claims = Vec::with_capacity(payload.len());

        for (name, value) in payload {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    claims.extend(
                        items
                            .iter()
                            .filter(|item| !item.is_null())
                            .map(|item| claim_from_json(name, item)),
                    );
                }
                other => claims.push(claim_from_json(name, other)),
            }
        }

        Self { claims }
    }

    /// All claims, in order.
    #[must_use]
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Returns true if any claim has exactly this type and value.
    #[must_use]
    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.claims.iter().any(|c| c.is(claim_type, value))
    }

    /// All claims of a type, oldest first.
    pub fn find_all<'a>(&'a self, claim_type: &'a str) -> impl DoubleEndedIterator<Item = &'a Claim> + 'a {
        self.claims.iter().filter(move |c| c.claim_type == claim_type)
    }

    /// The most recently added claim of a type.
    #[must_use]
    pub fn last(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().rev().find(|c| c.claim_type == claim_type)
    }

    /// Consume the principal and return one with `extra` appended.
    ///
    /// A claim whose type and value are already present is not added again,
    /// so replaying the same additions is a no-op.
    #[must_use]
    pub fn with_claims(mut self, extra: impl IntoIterator<Item = Claim>) -> Self {
        for claim in extra {
            if !self.claims.iter().any(|c| c.same_assertion(&claim)) {
                self.claims.push(claim);
            }
        }
        self
    }
}

fn claim_from_json(name: &str, value: &Value) -> Claim {
    Claim::new(name, &ClaimValue::from_json(value.clone()))
}
