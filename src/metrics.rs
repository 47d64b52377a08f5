//! Dispatch metrics for the stats client
//!
//! Counters and histograms are emitted through the `metrics` facade, so they
//! cost nothing unless a recorder is installed. [`init_metrics`] installs a
//! Prometheus exporter for long-running processes.
//!
//! ## Metrics
//!
//! - `stats_requests_total` (endpoint, status)
//! - `stats_request_duration_seconds` (endpoint)
//! - `stats_queue_wait_seconds`
//! - `stats_timeouts_total` (endpoint)
//! - `stats_degraded_total` (endpoint)

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static METRICS_INITIALIZED: OnceCell<SocketAddr> = OnceCell::new();

static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Install the Prometheus exporter and describe all metrics
///
/// Idempotent: later calls are ignored once an exporter is running. Concurrent
/// first calls install exactly one exporter; the others wait for it.
///
/// # Arguments
/// * `addr` - Socket address for the scrape endpoint (e.g. "127.0.0.1:9090")
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut installed = false;
    let bound = METRICS_INITIALIZED.get_or_try_init(|| {
        install_exporter(addr)?;
        installed = true;
        Ok::<_, String>(addr)
    })?;

    if installed {
        info!("Metrics exporter listening on {}", bound);
    } else {
        debug!("Metrics already initialized on {}, skipping", bound);
    }
    Ok(())
}

fn install_exporter(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "stats_requests_total",
        Unit::Count,
        "Requests dispatched to the stats backend"
    );
    describe_histogram!(
        "stats_request_duration_seconds",
        Unit::Seconds,
        "Time from dispatch to final response"
    );
    describe_histogram!(
        "stats_queue_wait_seconds",
        Unit::Seconds,
        "Time a request spent queued before dispatch"
    );
    describe_counter!(
        "stats_timeouts_total",
        Unit::Count,
        "Calls that exceeded the per-call timeout"
    );
    describe_counter!(
        "stats_degraded_total",
        Unit::Count,
        "Enumeration calls that degraded to an empty result"
    );
    Ok(())
}

/// Next correlation id for request tracing
pub fn next_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing of one dispatched request
pub struct DispatchMetrics {
    endpoint: String,
    start_time: Instant,
    correlation_id: String,
}

impl DispatchMetrics {
    /// Start timing a dispatch that waited `queue_wait` in the queue
    pub fn start(endpoint: impl Into<String>, queue_wait: Duration) -> Self {
        let endpoint = endpoint.into();
        let correlation_id = next_correlation_id();

        histogram!("stats_queue_wait_seconds").record(queue_wait.as_secs_f64());

        debug!(
            correlation_id = %correlation_id,
            endpoint = %endpoint,
            queue_wait_ms = queue_wait.as_millis(),
            "Dispatching request"
        );

        Self {
            endpoint,
            start_time: Instant::now(),
            correlation_id,
        }
    }

    /// Record a response with `status`
    pub fn record_complete(&self, status: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "stats_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string(),
        )
        .increment(1);

        histogram!(
            "stats_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            status = status,
            duration_ms = duration.as_millis(),
            "Request completed"
        );
    }

    /// Record a failure with no status code
    pub fn record_network_error(&self, error: &str) {
        let duration = self.start_time.elapsed();

        counter!(
            "stats_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => "network_error",
        )
        .increment(1);

        warn!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            duration_ms = duration.as_millis(),
            error = %error,
            "Request failed without a response"
        );
    }

    /// Correlation id of this dispatch
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record a call that hit the per-call timeout
pub fn record_timeout(endpoint: &str, timeout: Duration) {
    counter!("stats_timeouts_total", "endpoint" => endpoint.to_string()).increment(1);

    warn!(
        endpoint = %endpoint,
        timeout_ms = timeout.as_millis(),
        "Request timed out; abandoning it"
    );
}

/// Record an enumeration call that degraded to an empty result
pub fn record_degraded(endpoint: &str, reason: &str) {
    counter!("stats_degraded_total", "endpoint" => endpoint.to_string()).increment(1);

    warn!(
        endpoint = %endpoint,
        reason = %reason,
        "Listing call degraded to an empty result"
    );
}

/// Whether [`init_metrics`] has installed an exporter
pub fn is_initialized() -> bool {
    METRICS_INITIALIZED.get().is_some()
}
