//! HTTP request handlers for the API service.

pub mod health;
pub mod keys;
pub mod me;
pub mod metrics;

pub use health::health_check;
pub use keys::verify_key;
pub use me::get_me;
pub use metrics::metrics_handler;
