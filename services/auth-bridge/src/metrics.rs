//! Prometheus metrics exposition
//!
//! - `bridge_flows_started_total` (counter): authorization flows created
//! - `bridge_callbacks_total` (counter): label `outcome`
//! - `bridge_token_grants_total` (counter): labels `grant_type`, `outcome`
//! - `bridge_upstream_errors_total` (counter): label `error_type`

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The handle's `render()` method produces the Prometheus text exposition
/// format suitable for serving on a `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a new authorization flow entering the system via `/authorize`.
pub fn record_flow_started() {
    metrics::counter!("bridge_flows_started_total").increment(1);
}

/// Record a completed upstream callback with an outcome label
/// (success, upstream_denied, unknown_state, exchange_failed).
pub fn record_callback(outcome: &str) {
    metrics::counter!("bridge_callbacks_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a `/token` grant attempt with its type and outcome.
pub fn record_token_grant(grant_type: &str, outcome: &str) {
    metrics::counter!(
        "bridge_token_grants_total",
        "grant_type" => grant_type.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record an upstream error with a classification label.
pub fn record_upstream_error(error_type: &str) {
    metrics::counter!("bridge_upstream_errors_total", "error_type" => error_type.to_string())
        .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        // When no recorder is installed, metrics calls are no-ops.
        record_flow_started();
        record_callback("success");
        record_token_grant("authorization_code", "success");
        record_upstream_error("timeout");
    }

    /// Create an isolated recorder/handle pair for unit tests.
    /// Uses build_recorder() instead of install_recorder() to avoid the
    /// global recorder singleton constraint — only one global recorder can
    /// exist per process, and install_recorder() panics on a second call.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn token_grant_counter_carries_both_labels() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_token_grant("authorization_code", "success");
        record_token_grant("refresh_token", "invalid_grant");

        let output = handle.render();
        assert!(output.contains("bridge_token_grants_total"));
        assert!(output.contains("grant_type=\"authorization_code\""));
        assert!(output.contains("outcome=\"success\""));
        assert!(output.contains("grant_type=\"refresh_token\""));
        assert!(output.contains("outcome=\"invalid_grant\""));
    }

    #[test]
    fn flow_and_error_counters_render() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_flow_started();
        record_callback("exchange_failed");
        record_upstream_error("exchange");

        let output = handle.render();
        assert!(output.contains("bridge_flows_started_total"));
        assert!(output.contains("outcome=\"exchange_failed\""));
        assert!(output.contains("error_type=\"exchange\""));
    }
}
