//! Observability module for the API service.
//!
//! Provides metrics definitions and instrumentation helpers.

pub mod metrics;
