//! API Service Library
//!
//! The protected edge of the Marquee API. Validates bearer tokens issued by
//! the identity service, turns them into a per-request [`common::claims::Principal`]
//! and gates privileged routes behind authorization policies.
//!
//! # Modules
//!
//! - `auth` - Token validation, claim resolution, authorization policies
//! - `config` - Service configuration
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication, policy and API-key middleware
//! - `observability` - Metrics definitions
//! - `routes` - Router and application state

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
