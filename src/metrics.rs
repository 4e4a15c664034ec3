//! Prometheus metrics for bucket requests.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`
//! and defines the metric names the bucket records for every request it
//! issues.  Without an installed recorder every recording is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

// -- Metric name constants ----------------------------------------------------

/// Total requests sent to the store (counter). Labels: method, status.
pub const REQUESTS_TOTAL: &str = "bucketfs_requests_total";

/// Request duration in seconds (histogram). Labels: method.
pub const REQUEST_DURATION_SECONDS: &str = "bucketfs_request_duration_seconds";

/// Total bytes sent in request bodies (counter).
pub const BYTES_SENT_TOTAL: &str = "bucketfs_bytes_sent_total";

/// Total bytes received in response bodies (counter).
pub const BYTES_RECEIVED_TOTAL: &str = "bucketfs_bytes_received_total";

// -- Global recorder installation ---------------------------------------------

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder")
    })
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Total requests sent to the store");
    describe_histogram!(REQUEST_DURATION_SECONDS, "Request duration in seconds");
    describe_counter!(BYTES_SENT_TOTAL, "Total bytes sent (request bodies)");
    describe_counter!(BYTES_RECEIVED_TOTAL, "Total bytes received (response bodies)");
}

/// Prometheus exposition text, or `None` if no recorder was installed.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(PrometheusHandle::render)
}

// -- Recording ----------------------------------------------------------------

/// Record one request/response exchange.
///
/// `status` is the HTTP status code, or `None` when no response was
/// obtained (recorded with the `error` label).
pub(crate) fn record_request(
    method: &http::Method,
    status: Option<u16>,
    elapsed: Duration,
    sent: usize,
    received: usize,
) {
    let method = method.to_string();
    let status = status.map_or_else(|| "error".to_string(), |s| s.to_string());

    counter!(REQUESTS_TOTAL, "method" => method.clone(), "status" => status).increment(1);
    histogram!(REQUEST_DURATION_SECONDS, "method" => method).record(elapsed.as_secs_f64());
    counter!(BYTES_SENT_TOTAL).increment(sent as u64);
    counter!(BYTES_RECEIVED_TOTAL).increment(received as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_requests_are_rendered() {
        init_metrics();
        describe_metrics();

        record_request(
            &http::Method::PUT,
            Some(200),
            Duration::from_millis(5),
            42,
            0,
        );
        record_request(&http::Method::GET, None, Duration::from_millis(1), 0, 0);

        let text = render_metrics().unwrap();
        assert!(text.contains(REQUESTS_TOTAL));
        assert!(text.contains("method=\"PUT\""));
        assert!(text.contains("status=\"error\""));
        assert!(text.contains(BYTES_SENT_TOTAL));
    }

    #[test]
    fn test_init_is_idempotent() {
        let a = init_metrics() as *const PrometheusHandle;
        let b = init_metrics() as *const PrometheusHandle;
        assert_eq!(a, b);
    }
}
