//! Owner lookup for the admin elevation key.
//!
//! When a request elevates through the admin key header, the request acts as
//! the user who owns that key. Resolving the owner is a collaborator seam so
//! a directory-backed implementation can replace [`StaticKeyOwner`].

use async_trait::async_trait;
use common::types::UserId;
use thiserror::Error;
use uuid::Uuid;

/// Owner of the admin key until a real directory lookup exists.
pub const PLACEHOLDER_OWNER: UserId =
    UserId(Uuid::from_u128(0xf134_3f32_6161_409e_af74_fbc8_ca89_58cc));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OwnerLookupError {
    #[error("No owner registered for key")]
    NotFound,

    #[error("Owner directory unavailable: {0}")]
    Unavailable(String),
}

/// Resolves the user identifier that owns an API key.
#[async_trait]
pub trait KeyOwnerResolver: Send + Sync {
    async fn resolve_owner(&self, key: &str) -> Result<UserId, OwnerLookupError>;
}

/// Returns the same owner for every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticKeyOwner {
    owner: UserId,
}

impl StaticKeyOwner {
    pub fn new(owner: UserId) -> Self {
        Self { owner }
    }

    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER_OWNER)
    }
}

impl Default for StaticKeyOwner {
    fn default() -> Self {
        Self::placeholder()
    }
}

#[async_trait]
impl KeyOwnerResolver for StaticKeyOwner {
    async fn resolve_owner(&self, _key: &str) -> Result<UserId, OwnerLookupError> {
        Ok(self.owner)
    }
}
