//! HTTP routes for the identity service.

use crate::config::Config;
use crate::handlers;
use crate::services::TokenIssuer;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Token issuer built from the signing configuration.
    pub issuer: TokenIssuer,

    /// Service configuration.
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            issuer: TokenIssuer::new(config.jwt.clone()),
            config,
        }
    }
}

/// Build the application routes.
///
/// - `POST /token` - Issue a token
/// - `/health` - Liveness probe
/// - `/metrics` - Prometheus metrics
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let token_routes = Router::new()
        .route("/token", post(handlers::handle_issue_token))
        .route("/health", get(handlers::health_check))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    token_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
