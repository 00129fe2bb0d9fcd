//! Metrics definitions for the API service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `api_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! - `status`: 2 values (success, error)
//! - `error_type`: bounded by `TokenValidationError` variants
//! - `policy`: 2 values (admin_only, trusted_member)
//! - `outcome`: `succeed` or one `FailureReason` label

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record one bearer token validation.
///
/// Metric: `api_token_validations_total`
/// Labels: `status`, `error_type`
pub fn record_token_validation(status: &str, error_type: Option<&str>) {
    counter!("api_token_validations_total",
        "status" => status.to_string(),
        "error_type" => error_type.unwrap_or("none").to_string()
    )
    .increment(1);
}

/// Record one policy evaluation.
///
/// Metric: `api_policy_decisions_total`
/// Labels: `policy`, `outcome`
pub fn record_policy_decision(policy: &str, outcome: &str) {
    counter!("api_policy_decisions_total",
        "policy" => policy.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_token_validation() {
        record_token_validation("success", None);
        record_token_validation("error", Some("expired"));
    }

    #[test]
    fn test_record_policy_decision() {
        record_policy_decision("admin_only", "succeed");
        record_policy_decision("trusted_member", "not_trusted_member");
    }
}
