//! Identity Service Library
//!
//! Issues signed bearer tokens for the Marquee API. Callers post an identity
//! assertion (user id, email, custom claims) and receive an HS256 JWT that
//! the API service validates with the same shared secret.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `observability` - Metrics definitions
//! - `routes` - Router and application state
//! - `services` - Token issuance

pub mod config;
pub mod errors;
pub mod handlers;
pub mod observability;
pub mod routes;
pub mod services;
