use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::models::{OutcomeStatus, SourceType};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    // Pre-register counters so they appear even before the first increment.
    for source in [SourceType::Live, SourceType::Polled] {
        counter!("signals_detected_total", "source" => source.as_str()).absolute(0);
    }
    counter!("decode_errors_total").absolute(0);
    counter!("poll_errors_total").absolute(0);
    counter!("feed_reconnects_total").absolute(0);
    counter!("signals_deduplicated_total").absolute(0);
    counter!("signals_forwarded_total").absolute(0);
    counter!("aggregated_signals_total").absolute(0);
    counter!("submission_attempts_total").absolute(0);
    for status in [
        OutcomeStatus::Submitted,
        OutcomeStatus::Failed,
        OutcomeStatus::SkippedBelowThreshold,
        OutcomeStatus::SkippedInsufficientBalance,
        OutcomeStatus::SkippedDuplicate,
    ] {
        counter!("execution_outcomes_total", "status" => status.as_str()).absolute(0);
    }

    gauge!("in_flight_requests").set(0.0);

    // Histogram is lazily created on first record; force creation.
    histogram!("detection_to_submit_seconds").record(0.0);

    Ok(handle)
}
