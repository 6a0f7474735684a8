//! Prometheus Metrics Module
//!
//! Exposes feed metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Connections**: opens, failures, retries, and exhaustion
//! - **Messages**: snapshots and updates applied, messages rejected
//! - **State**: current connection state and quote count
//!
//! # Integration
//!
//! [`PrometheusReporter`] is injected into the stream manager as its
//! `StreamReporter`. Metrics are exposed at `/metrics` on the health server
//! port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::ports::StreamReporter;
use crate::domain::connection::ConnectionState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the already-installed handle.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed, for example when
/// another global recorder is already set.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

const CONNECTIONS_OPENED: &str = "live_market_connections_opened_total";
const CONNECTION_FAILURES: &str = "live_market_connection_failures_total";
const RETRIES_SCHEDULED: &str = "live_market_retries_scheduled_total";
const RETRIES_EXHAUSTED: &str = "live_market_retries_exhausted_total";
const RETRY_DELAY: &str = "live_market_retry_delay_seconds";
const SNAPSHOTS_APPLIED: &str = "live_market_snapshots_applied_total";
const UPDATES_APPLIED: &str = "live_market_updates_applied_total";
const MESSAGES_REJECTED: &str = "live_market_messages_rejected_total";
const CONNECTION_STATE: &str = "live_market_connection_state";
const QUOTES: &str = "live_market_quotes";

fn register_metrics() {
    // Connection counters
    describe_counter!(CONNECTIONS_OPENED, "Total feed connections accepted");
    describe_counter!(CONNECTION_FAILURES, "Total feed connections failed or closed");
    describe_counter!(RETRIES_SCHEDULED, "Total reconnect attempts scheduled");
    describe_counter!(
        RETRIES_EXHAUSTED,
        "Times the reconnect limit was reached and the feed went offline"
    );
    describe_histogram!(RETRY_DELAY, "Backoff delay before each reconnect");

    // Message counters
    describe_counter!(SNAPSHOTS_APPLIED, "Total snapshots applied to the quote set");
    describe_counter!(UPDATES_APPLIED, "Total single-quote updates merged");
    describe_counter!(MESSAGES_REJECTED, "Total malformed messages dropped by reason");

    // State gauges
    describe_gauge!(
        CONNECTION_STATE,
        "Connection state (0 = offline, 1 = reconnecting, 2 = live)"
    );
    describe_gauge!(QUOTES, "Number of quotes currently held");
}

// =============================================================================
// Reporter
// =============================================================================

/// `StreamReporter` backed by the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusReporter;

impl PrometheusReporter {
    /// Create a reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StreamReporter for PrometheusReporter {
    fn connection_opened(&self) {
        counter!(CONNECTIONS_OPENED).increment(1);
    }

    fn connection_failed(&self, _reason: &str) {
        counter!(CONNECTION_FAILURES).increment(1);
    }

    fn retry_scheduled(&self, _attempt: u32, delay: Duration) {
        counter!(RETRIES_SCHEDULED).increment(1);
        histogram!(RETRY_DELAY).record(delay.as_secs_f64());
    }

    fn retries_exhausted(&self, _attempts: u32) {
        counter!(RETRIES_EXHAUSTED).increment(1);
    }

    fn snapshot_applied(&self, _quote_count: usize) {
        counter!(SNAPSHOTS_APPLIED).increment(1);
    }

    fn update_applied(&self) {
        counter!(UPDATES_APPLIED).increment(1);
    }

    fn message_rejected(&self, kind: &'static str) {
        counter!(MESSAGES_REJECTED, "reason" => kind).increment(1);
    }

    #[allow(clippy::cast_precision_loss)]
    fn state_changed(&self, state: ConnectionState, quote_count: usize) {
        gauge!(CONNECTION_STATE).set(state.as_gauge());
        gauge!(QUOTES).set(quote_count as f64);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn render_with(record: impl FnOnce(&PrometheusReporter)) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || record(&PrometheusReporter::new()));
        handle.render()
    }

    #[test]
    fn counts_connection_lifecycle() {
        let body = render_with(|r| {
            r.connection_opened();
            r.connection_failed("closed");
            r.connection_failed("closed");
            r.retry_scheduled(1, Duration::from_millis(1500));
        });

        assert!(body.contains("live_market_connections_opened_total 1"));
        assert!(body.contains("live_market_connection_failures_total 2"));
        assert!(body.contains("live_market_retries_scheduled_total 1"));
    }

    #[test]
    fn labels_rejections_by_reason() {
        let body = render_with(|r| {
            r.message_rejected("json");
            r.message_rejected("shape");
            r.message_rejected("json");
        });

        assert!(body.contains("live_market_messages_rejected_total{reason=\"json\"} 2"));
        assert!(body.contains("live_market_messages_rejected_total{reason=\"shape\"} 1"));
    }

    #[test]
    fn gauges_track_state() {
        let body = render_with(|r| {
            r.state_changed(ConnectionState::Reconnecting, 0);
            r.state_changed(ConnectionState::Live, 3);
        });

        assert!(body.contains("live_market_connection_state 2"));
        assert!(body.contains("live_market_quotes 3"));
    }
}
