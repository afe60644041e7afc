//! Metrics definitions for the session service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `session_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `endpoint`: the handful of routes below, everything else is `/other`
//! - `status`: success, error, timeout, or a `SessionError::kind()` label
//! - `operation`: create_meeting, create_attendee, delete_meeting
//!
//! Meeting titles and attendee names are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle for `/metrics`.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("session_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Joins include one or two provider round trips
        .set_buckets_for_metric(
            Matcher::Prefix("session_join".to_string()),
            &[0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set join buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("session_provider_request".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set provider request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `session_http_requests_total`, `session_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("session_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("session_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto a bounded label set.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/join" => "/join",
        "/end" => "/end",
        "/attendee" => "/attendee",
        "/logs" => "/logs",
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// Session Metrics
// ============================================================================

/// Record a join attempt.
///
/// Metric: `session_joins_total`, `session_join_duration_seconds`
/// Labels: `status`, `meeting_created`
pub fn record_join(status: &str, meeting_created: bool, duration: Duration) {
    histogram!("session_join_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("session_joins_total",
        "status" => status.to_string(),
        "meeting_created" => meeting_created.to_string()
    )
    .increment(1);
}

/// Record an end-meeting attempt.
///
/// Metric: `session_meetings_ended_total`
/// Labels: `status`
pub fn record_meeting_ended(status: &str) {
    counter!("session_meetings_ended_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Set the number of live meetings in the registry.
///
/// Metric: `session_active_meetings`
pub fn set_active_meetings(count: usize) {
    gauge!("session_active_meetings").set(count as f64);
}

// ============================================================================
// Provider Metrics
// ============================================================================

/// Record a provider API call.
///
/// Metric: `session_provider_requests_total`, `session_provider_request_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_provider_request(operation: &str, status: &str, duration: Duration) {
    histogram!("session_provider_request_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("session_provider_requests_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
