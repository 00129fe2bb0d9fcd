//! HTTP routes for the API service.

use crate::auth::policy::AdminKeyError;
use crate::auth::{AdminKey, KeyOwnerResolver, Policy, PolicyEngine, TokenValidator};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{
    optional_auth, require_api_key, require_auth, require_policy, AuthState, PolicyGate,
};
use axum::{
    middleware,
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
    /// Service configuration.
    pub config: Config,

    /// Bearer token validator.
    pub validator: Arc<TokenValidator>,

    /// Policy engine holding the admin key.
    pub engine: Arc<PolicyEngine>,
}

impl AppState {
    /// # Errors
    ///
    /// `AdminKeyError` if the admin key comparison cannot be initialized.
    pub fn new(
        config: Config,
        owner_resolver: Arc<dyn KeyOwnerResolver>,
    ) -> Result<Self, AdminKeyError> {
        let validator = Arc::new(TokenValidator::new(&config.jwt, config.jwt_clock_skew));
        let admin_key = AdminKey::new(&config.admin_api_key)?;
        let engine = Arc::new(PolicyEngine::new(
            admin_key,
            config.api_key_header.clone(),
            owner_resolver,
        ));

        Ok(Self {
            config,
            validator,
            engine,
        })
    }
}

fn policy_layer_state(state: &AppState, policy: Policy) -> Arc<PolicyGate> {
    Arc::new(PolicyGate {
        engine: Arc::clone(&state.engine),
        policy,
    })
}

/// Build the application routes.
///
/// - Public: `/health`, `/metrics`
/// - Bearer-protected: `GET /api/v1/me`
/// - Bearer + TrustedMember: `GET /api/v1/me/trusted`
/// - Optional bearer + AdminOnly: `GET /api/v1/me/admin` (the elevation
///   header alone is enough)
/// - API key only: `POST /api/v1/keys/verify`
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        validator: Arc::clone(&state.validator),
    });

    let public_routes = Router::new().route("/health", get(handlers::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let trusted_routes = Router::new()
        .route("/api/v1/me/trusted", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(
            policy_layer_state(&state, Policy::TrustedMember),
            require_policy,
        ));

    // route_layer wraps inner-first, so authentication runs before any policy gate
    let protected_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .merge(trusted_routes)
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&auth_state),
            require_auth,
        ));

    let admin_routes = Router::new()
        .route("/api/v1/me/admin", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(
            policy_layer_state(&state, Policy::AdminOnly),
            require_policy,
        ))
        .route_layer(middleware::from_fn_with_state(auth_state, optional_auth));

    let key_routes = Router::new()
        .route("/api/v1/keys/verify", post(handlers::verify_key))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.engine),
            require_api_key,
        ));

    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .merge(key_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
