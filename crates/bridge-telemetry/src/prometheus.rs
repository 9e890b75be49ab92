// Path: crates/bridge-telemetry/src/prometheus.rs
//! A concrete implementation of the metrics sinks using the Prometheus crate.

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_gauge_vec, register_histogram_vec, register_int_counter,
    register_int_counter_vec, GaugeVec, HistogramVec, IntCounter, IntCounterVec,
};

// --- Metric Statics ---
// We use OnceCell to hold the metric collectors. They are initialized
// exactly once by the `install` function.

static SCHEDULER_POSTED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static SCHEDULER_SUCCESSFUL_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static SCHEDULER_FAILED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static SCHEDULER_ACTIVE_TASKS: OnceCell<GaugeVec> = OnceCell::new();

static SEQUENCE_NEXT: OnceCell<GaugeVec> = OnceCell::new();
static SEQUENCE_CONFIRMED: OnceCell<GaugeVec> = OnceCell::new();
static SEQUENCE_IN_FLIGHT: OnceCell<GaugeVec> = OnceCell::new();
static SEQUENCE_MAJOR_RESYNC_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

static TRACKER_TRACKED: OnceCell<GaugeVec> = OnceCell::new();
static TRACKER_COMPLETED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static TRACKER_BATCH_ASSIGNED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static TRACKER_ABANDONED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static TRACKER_COMPLETION_LATENCY_SECONDS: OnceCell<HistogramVec> = OnceCell::new();

static CHAIN_PUSH_ATTEMPT_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static CHAIN_PUSH_SUCCESS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static CHAIN_PUSH_FAILURE_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static CHAIN_PUSH_DURATION_SECONDS: OnceCell<HistogramVec> = OnceCell::new();
static CHAIN_HEALTHY: OnceCell<GaugeVec> = OnceCell::new();

static PUSH_PENDING_BATCHES: OnceCell<GaugeVec> = OnceCell::new();
static PUSH_FAILED_RETRY_BATCHES: OnceCell<GaugeVec> = OnceCell::new();
static PUSH_BATCH_DISCOVERED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static PUSH_BATCH_COMPLETED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static PUSH_BATCH_ABANDONED_TOTAL: OnceCell<IntCounter> = OnceCell::new();

static ERRORS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

/// Helper macro to reduce boilerplate for getting a metric from OnceCell.
/// This will panic if `install()` has not been called, which is intentional
/// as it indicates a critical application setup error.
macro_rules! get_metric {
    ($metric:ident) => {
        $metric
            .get()
            .expect("Prometheus sink not initialized. Call telemetry::prometheus::install() first.")
    };
}

impl SchedulerMetricsSink for PrometheusSink {
    fn inc_posted(&self) {
        get_metric!(SCHEDULER_POSTED_TOTAL).inc();
    }
    fn inc_successful(&self) {
        get_metric!(SCHEDULER_SUCCESSFUL_TOTAL).inc();
    }
    fn inc_failed(&self) {
        get_metric!(SCHEDULER_FAILED_TOTAL).inc();
    }
    fn set_active_tasks(&self, count: u64) {
        get_metric!(SCHEDULER_ACTIVE_TASKS)
            .with_label_values(&["scheduler"])
            .set(count as f64);
    }
}

impl SequenceMetricsSink for PrometheusSink {
    fn set_next_sequence(&self, signer: &str, value: u64) {
        get_metric!(SEQUENCE_NEXT)
            .with_label_values(&[signer])
            .set(value as f64);
    }
    fn set_confirmed_sequence(&self, signer: &str, value: u64) {
        get_metric!(SEQUENCE_CONFIRMED)
            .with_label_values(&[signer])
            .set(value as f64);
    }
    fn set_in_flight(&self, signer: &str, count: u64) {
        get_metric!(SEQUENCE_IN_FLIGHT)
            .with_label_values(&[signer])
            .set(count as f64);
    }
    fn inc_major_resync(&self, signer: &str) {
        get_metric!(SEQUENCE_MAJOR_RESYNC_TOTAL)
            .with_label_values(&[signer])
            .inc();
    }
}

impl TrackerMetricsSink for PrometheusSink {
    fn set_tracked(&self, count: u64) {
        get_metric!(TRACKER_TRACKED)
            .with_label_values(&["tracker"])
            .set(count as f64);
    }
    fn inc_completed(&self) {
        get_metric!(TRACKER_COMPLETED_TOTAL).inc();
    }
    fn inc_batch_assigned(&self) {
        get_metric!(TRACKER_BATCH_ASSIGNED_TOTAL).inc();
    }
    fn inc_abandoned(&self) {
        get_metric!(TRACKER_ABANDONED_TOTAL).inc();
    }
    fn observe_completion_latency(&self, duration_secs: f64) {
        get_metric!(TRACKER_COMPLETION_LATENCY_SECONDS)
            .with_label_values(&["completion"])
            .observe(duration_secs);
    }
}

impl ChainMetricsSink for PrometheusSink {
    fn inc_push_attempt(&self, chain_id: &str) {
        get_metric!(CHAIN_PUSH_ATTEMPT_TOTAL)
            .with_label_values(&[chain_id])
            .inc();
    }
    fn inc_push_success(&self, chain_id: &str) {
        get_metric!(CHAIN_PUSH_SUCCESS_TOTAL)
            .with_label_values(&[chain_id])
            .inc();
    }
    fn inc_push_failure(&self, chain_id: &str, reason: &'static str) {
        get_metric!(CHAIN_PUSH_FAILURE_TOTAL)
            .with_label_values(&[chain_id, reason])
            .inc();
    }
    fn observe_push_duration(&self, chain_id: &str, duration_secs: f64) {
        get_metric!(CHAIN_PUSH_DURATION_SECONDS)
            .with_label_values(&[chain_id])
            .observe(duration_secs);
    }
    fn set_chain_health(&self, chain_id: &str, healthy: bool) {
        get_metric!(CHAIN_HEALTHY)
            .with_label_values(&[chain_id])
            .set(if healthy { 1.0 } else { 0.0 });
    }
}

impl PushMetricsSink for PrometheusSink {
    fn set_pending_batches(&self, count: u64) {
        get_metric!(PUSH_PENDING_BATCHES)
            .with_label_values(&["push"])
            .set(count as f64);
    }
    fn set_failed_retry_batches(&self, count: u64) {
        get_metric!(PUSH_FAILED_RETRY_BATCHES)
            .with_label_values(&["push"])
            .set(count as f64);
    }
    fn inc_batch_discovered(&self) {
        get_metric!(PUSH_BATCH_DISCOVERED_TOTAL).inc();
    }
    fn inc_batch_completed(&self) {
        get_metric!(PUSH_BATCH_COMPLETED_TOTAL).inc();
    }
    fn inc_batch_abandoned(&self) {
        get_metric!(PUSH_BATCH_ABANDONED_TOTAL).inc();
    }
}

impl ErrorMetricsSink for PrometheusSink {
    fn inc_error(&self, kind: &'static str, variant: &'static str) {
        get_metric!(ERRORS_TOTAL)
            .with_label_values(&[kind, variant])
            .inc();
    }
}

/// Initializes all Prometheus metrics collectors and returns a static reference to the sink.
/// This function must be called only once at application startup.
#[allow(clippy::expect_used)]
pub fn install() -> Result<&'static dyn MetricsSink, prometheus::Error> {
    SCHEDULER_POSTED_TOTAL
        .set(register_int_counter!(
            "seda_bridge_scheduler_posted_total",
            "Total DataRequests submitted by the scheduler."
        )?)
        .expect("static already initialized");
    SCHEDULER_SUCCESSFUL_TOTAL
        .set(register_int_counter!(
            "seda_bridge_scheduler_successful_total",
            "Total DataRequests that posted successfully."
        )?)
        .expect("static already initialized");
    SCHEDULER_FAILED_TOTAL
        .set(register_int_counter!(
            "seda_bridge_scheduler_failed_total",
            "Total DataRequests that failed to post."
        )?)
        .expect("static already initialized");
    SCHEDULER_ACTIVE_TASKS
        .set(register_gauge_vec!(
            "seda_bridge_scheduler_active_tasks",
            "Number of in-flight scheduler tasks.",
            &["component"]
        )?)
        .expect("static already initialized");
    SEQUENCE_NEXT
        .set(register_gauge_vec!(
            "seda_bridge_sequence_next",
            "Next sequence number to be allocated, per signer.",
            &["signer"]
        )?)
        .expect("static already initialized");
    SEQUENCE_CONFIRMED
        .set(register_gauge_vec!(
            "seda_bridge_sequence_confirmed",
            "Highest confirmed sequence number, per signer.",
            &["signer"]
        )?)
        .expect("static already initialized");
    SEQUENCE_IN_FLIGHT
        .set(register_gauge_vec!(
            "seda_bridge_sequence_in_flight",
            "Allocated but unconfirmed sequences, per signer.",
            &["signer"]
        )?)
        .expect("static already initialized");
    SEQUENCE_MAJOR_RESYNC_TOTAL
        .set(register_int_counter_vec!(
            "seda_bridge_sequence_major_resync_total",
            "Total forced major sequence resyncs, per signer.",
            &["signer"]
        )?)
        .expect("static already initialized");
    TRACKER_TRACKED
        .set(register_gauge_vec!(
            "seda_bridge_tracker_tracked",
            "Number of DataRequests currently tracked for completion.",
            &["component"]
        )?)
        .expect("static already initialized");
    TRACKER_COMPLETED_TOTAL
        .set(register_int_counter!(
            "seda_bridge_tracker_completed_total",
            "Total DataRequests observed as completed."
        )?)
        .expect("static already initialized");
    TRACKER_BATCH_ASSIGNED_TOTAL
        .set(register_int_counter!(
            "seda_bridge_tracker_batch_assigned_total",
            "Total DataRequests whose batch assignment was discovered."
        )?)
        .expect("static already initialized");
    TRACKER_ABANDONED_TOTAL
        .set(register_int_counter!(
            "seda_bridge_tracker_abandoned_total",
            "Total DataRequests abandoned after exhausting retries."
        )?)
        .expect("static already initialized");
    TRACKER_COMPLETION_LATENCY_SECONDS
        .set(register_histogram_vec!(
            "seda_bridge_tracker_completion_latency_seconds",
            "Latency between posting a DataRequest and observing completion.",
            &["stage"],
            exponential_buckets(0.5, 2.0, 12)?
        )?)
        .expect("static already initialized");
    CHAIN_PUSH_ATTEMPT_TOTAL
        .set(register_int_counter_vec!(
            "seda_bridge_chain_push_attempt_total",
            "Total batch push attempts, per destination chain.",
            &["chain_id"]
        )?)
        .expect("static already initialized");
    CHAIN_PUSH_SUCCESS_TOTAL
        .set(register_int_counter_vec!(
            "seda_bridge_chain_push_success_total",
            "Total successful batch pushes, per destination chain.",
            &["chain_id"]
        )?)
        .expect("static already initialized");
    CHAIN_PUSH_FAILURE_TOTAL
        .set(register_int_counter_vec!(
            "seda_bridge_chain_push_failure_total",
            "Total failed batch pushes, per destination chain and reason.",
            &["chain_id", "reason"]
        )?)
        .expect("static already initialized");
    CHAIN_PUSH_DURATION_SECONDS
        .set(register_histogram_vec!(
            "seda_bridge_chain_push_duration_seconds",
            "Latency of a single batch push, per destination chain.",
            &["chain_id"],
            exponential_buckets(0.05, 2.0, 14)?
        )?)
        .expect("static already initialized");
    CHAIN_HEALTHY
        .set(register_gauge_vec!(
            "seda_bridge_chain_healthy",
            "1 if the destination chain is currently healthy, 0 otherwise.",
            &["chain_id"]
        )?)
        .expect("static already initialized");
    PUSH_PENDING_BATCHES
        .set(register_gauge_vec!(
            "seda_bridge_push_pending_batches",
            "Number of batches currently pending in the push queue.",
            &["component"]
        )?)
        .expect("static already initialized");
    PUSH_FAILED_RETRY_BATCHES
        .set(register_gauge_vec!(
            "seda_bridge_push_failed_retry_batches",
            "Number of batches currently held in the failed-retry map.",
            &["component"]
        )?)
        .expect("static already initialized");
    PUSH_BATCH_DISCOVERED_TOTAL
        .set(register_int_counter!(
            "seda_bridge_push_batch_discovered_total",
            "Total batches discovered from the completion tracker."
        )?)
        .expect("static already initialized");
    PUSH_BATCH_COMPLETED_TOTAL
        .set(register_int_counter!(
            "seda_bridge_push_batch_completed_total",
            "Total batches that completed across all destination chains."
        )?)
        .expect("static already initialized");
    PUSH_BATCH_ABANDONED_TOTAL
        .set(register_int_counter!(
            "seda_bridge_push_batch_abandoned_total",
            "Total batches abandoned after exhausting retry attempts."
        )?)
        .expect("static already initialized");
    ERRORS_TOTAL
        .set(register_int_counter_vec!(
            "seda_bridge_errors_total",
            "Total number of errors, categorized by kind and variant.",
            &["kind", "variant"]
        )?)
        .expect("static already initialized");

    static SINK: PrometheusSink = PrometheusSink;
    Ok(&SINK)
}
