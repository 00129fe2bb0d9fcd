//! Liveness probe handler.

/// Returns "OK" while the process is running. Checks no dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}
