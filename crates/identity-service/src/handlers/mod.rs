//! HTTP request handlers for the identity service.

pub mod health;
pub mod metrics;
pub mod token_handler;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use token_handler::handle_issue_token;
