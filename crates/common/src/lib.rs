//! Common utilities and types shared across Marquee auth components.

#![warn(clippy::pedantic)]

/// Module for claim and principal types
pub mod claims;

/// Module for common data types
pub mod types;

/// Module for shared signing configuration
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, clock skew, payload peeking)
pub mod jwt;

/// Module for the client-side token cache with single-flight refresh
pub mod token_cache;
