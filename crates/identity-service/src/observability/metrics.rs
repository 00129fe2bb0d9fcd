//! Metrics definitions for the identity service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `identity_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! - `status`: 2 values (success, error)
//! - `error_type`: bounded by `IssueError` variants

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Issuance is a single HMAC over a small payload
        .set_buckets_for_metric(
            Matcher::Prefix("identity_token_issuance".to_string()),
            &[0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record token issuance duration and outcome
///
/// Metric: `identity_token_issuance_duration_seconds`, `identity_token_issuance_total`
/// Labels: `status`, `error_type`
pub fn record_token_issuance(status: &str, error_type: Option<&str>, duration: Duration) {
    histogram!("identity_token_issuance_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("identity_token_issuance_total",
        "status" => status.to_string(),
        "error_type" => error_type.unwrap_or("none").to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // No recorder is installed here, so these run against the global no-op
    // recorder. Rendered output is checked in the integration tests.

    #[test]
    fn test_record_token_issuance() {
        record_token_issuance("success", None, Duration::from_micros(400));
        record_token_issuance("error", Some("reserved_claim"), Duration::from_micros(50));
        record_token_issuance("error", Some("invalid_request"), Duration::from_micros(20));
    }
}
