//! Business logic for the identity service.

pub mod token_service;

pub use token_service::{IssueError, IssuedToken, TokenIssuer, TokenRequest};
