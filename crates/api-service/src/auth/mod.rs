//! Authentication and authorization for the API service.
//!
//! # Components
//!
//! - `jwt` - Bearer token validation into a `Principal`
//! - `claims` - Reading well-known claims from a `Principal`
//! - `key_owner` - Resolving the user that owns the admin key
//! - `policy` - AdminOnly and TrustedMember policy evaluation

pub mod claims;
pub mod jwt;
pub mod key_owner;
pub mod policy;

pub use jwt::{TokenValidationError, TokenValidator};
pub use key_owner::{KeyOwnerResolver, OwnerLookupError, StaticKeyOwner};
pub use policy::{
    AdminKey, FailureReason, HeaderSource, Outcome, Policy, PolicyDecision, PolicyEngine,
};
