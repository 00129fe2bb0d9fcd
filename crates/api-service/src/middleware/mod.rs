//! Middleware for the API service.
//!
//! # Components
//!
//! - `auth` - Bearer authentication (required or optional), policy gates and
//!   the API-key filter

pub mod auth;

pub use auth::{
    optional_auth, require_api_key, require_auth, require_policy, AuthState, PolicyGate,
};
