use crate::error::{LimiterError, Result};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const HITS_TOTAL: &str = "limiter_hits_total";
const REJECTIONS_TOTAL: &str = "limiter_rejections_total";
const STORE_ERRORS_TOTAL: &str = "limiter_store_errors_total";
const STORE_BATCH_DURATION: &str = "limiter_store_batch_duration_seconds";

/// Metrics service for collecting and exposing Prometheus metrics
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl MetricsService {
    /// Install a global Prometheus recorder
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            LimiterError::Config(format!("Failed to install metrics recorder: {}", e))
        })?;

        register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Register all metrics with descriptions
pub fn register_metrics() {
    describe_counter!(HITS_TOTAL, "Total number of hits recorded, by outcome");
    describe_counter!(
        REJECTIONS_TOTAL,
        "Total number of hits over their subject's limit"
    );
    describe_counter!(
        STORE_ERRORS_TOTAL,
        "Total number of hit batches the store failed to apply"
    );
    describe_histogram!(
        STORE_BATCH_DURATION,
        "Latency of one atomic hit batch against the store, in seconds"
    );

    debug!("All metrics registered with descriptions");
}

/// Record the outcome of one hit
pub fn record_hit(allowed: bool) {
    let outcome = if allowed { "allowed" } else { "rejected" };
    counter!(HITS_TOTAL, "outcome" => outcome).increment(1);

    if !allowed {
        counter!(REJECTIONS_TOTAL).increment(1);
    }
}

/// Record a failed store batch
pub fn record_store_error() {
    counter!(STORE_ERRORS_TOTAL).increment(1);
}

/// Record how long a store batch took
pub fn record_store_batch(elapsed: Duration) {
    histogram!(STORE_BATCH_DURATION).record(elapsed.as_secs_f64());
}
