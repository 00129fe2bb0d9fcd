//! Observability module for the identity service.

pub mod metrics;
