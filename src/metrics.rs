use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::Once;
use std::time::Duration;

pub const RENDER_REQUESTS_TOTAL: &str = "pdf_render_requests_total";
pub const RENDER_FAILURES_TOTAL: &str = "pdf_render_failures_total";
pub const RENDER_DURATION_SECONDS: &str = "pdf_render_duration_seconds";
pub const RENDER_IN_FLIGHT: &str = "pdf_render_in_flight";

/// Render durations cluster between a second and the 60 second budget.
const DURATION_BUCKETS: [f64; 9] = [0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 90.0];

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global Prometheus recorder. Call before [`describe_metrics`]
/// so the descriptions reach it; the handle renders `/metrics`.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    prometheus_builder()?.install_recorder()
}

fn prometheus_builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(RENDER_DURATION_SECONDS.to_string()),
        &DURATION_BUCKETS,
    )
}

/// Register metric descriptions with whatever recorder is installed.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            RENDER_REQUESTS_TOTAL,
            Unit::Count,
            "Renders started after request validation."
        );
        describe_counter!(
            RENDER_FAILURES_TOTAL,
            Unit::Count,
            "Renders that failed, labelled by error kind."
        );
        describe_histogram!(
            RENDER_DURATION_SECONDS,
            Unit::Seconds,
            "Wall time from browser launch to browser close."
        );
        describe_gauge!(
            RENDER_IN_FLIGHT,
            Unit::Count,
            "Renders holding a browser or waiting for a permit."
        );
    });
}

pub fn record_render_started() {
    counter!(RENDER_REQUESTS_TOTAL).increment(1);
}

/// Record a finished render. `failure` carries the error kind label.
pub fn record_render_finished(duration: Duration, failure: Option<&'static str>) {
    histogram!(RENDER_DURATION_SECONDS).record(duration.as_secs_f64());

    if let Some(kind) = failure {
        counter!(RENDER_FAILURES_TOTAL, "kind" => kind).increment(1);
    }
}

pub fn set_in_flight(count: usize) {
    gauge!(RENDER_IN_FLIGHT).set(count as f64);
}
