// Path: crates/bridge-telemetry/src/sinks.rs
//! Defines abstract traits for metrics reporting, decoupling core logic from the backend.

use once_cell::sync::OnceCell;

// --- Static Sink Access ---

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// A lazily-initialized static reference to the global `MetricsSink` implementation.
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns a static reference to the configured scheduler metrics sink.
pub fn scheduler_metrics() -> &'static dyn SchedulerMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns a static reference to the configured sequence allocator metrics sink.
pub fn sequence_metrics() -> &'static dyn SequenceMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns a static reference to the configured completion tracker metrics sink.
pub fn tracker_metrics() -> &'static dyn TrackerMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns a static reference to the configured per-chain metrics sink.
pub fn chain_metrics() -> &'static dyn ChainMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns a static reference to the configured push service metrics sink.
pub fn push_metrics() -> &'static dyn PushMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns a static reference to the configured error metrics sink.
pub fn error_metrics() -> &'static dyn ErrorMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

// --- Trait Definitions ---

/// Metrics for the DataRequest scheduler (C5).
pub trait SchedulerMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the counter of DataRequests posted.
    fn inc_posted(&self);
    /// Increments the counter of DataRequests that posted successfully.
    fn inc_successful(&self);
    /// Increments the counter of DataRequests that failed to post.
    fn inc_failed(&self);
    /// Sets the gauge of currently in-flight scheduler tasks.
    fn set_active_tasks(&self, count: u64);
}
impl SchedulerMetricsSink for NopSink {
    fn inc_posted(&self) {}
    fn inc_successful(&self) {}
    fn inc_failed(&self) {}
    fn set_active_tasks(&self, _count: u64) {}
}

/// Metrics for the sequence allocator and validator (C2, C4).
pub trait SequenceMetricsSink: Send + Sync + std::fmt::Debug {
    /// Sets the gauge of the next sequence number to be allocated.
    fn set_next_sequence(&self, signer: &str, value: u64);
    /// Sets the gauge of the highest confirmed sequence number.
    fn set_confirmed_sequence(&self, signer: &str, value: u64);
    /// Sets the gauge of sequences currently allocated but unconfirmed.
    fn set_in_flight(&self, signer: &str, count: u64);
    /// Increments the counter of reconciliations that forced a major resync.
    fn inc_major_resync(&self, signer: &str);
}
impl SequenceMetricsSink for NopSink {
    fn set_next_sequence(&self, _signer: &str, _value: u64) {}
    fn set_confirmed_sequence(&self, _signer: &str, _value: u64) {}
    fn set_in_flight(&self, _signer: &str, _count: u64) {}
    fn inc_major_resync(&self, _signer: &str) {}
}

/// Metrics for the completion tracker (C6).
pub trait TrackerMetricsSink: Send + Sync + std::fmt::Debug {
    /// Sets the gauge of DataRequests currently being tracked.
    fn set_tracked(&self, count: u64);
    /// Increments the counter of DataRequests that reached completion.
    fn inc_completed(&self);
    /// Increments the counter of DataRequests whose batch assignment was discovered.
    fn inc_batch_assigned(&self);
    /// Increments the counter of DataRequests abandoned after exhausting retries.
    fn inc_abandoned(&self);
    /// Observes the latency in seconds between posting and completion.
    fn observe_completion_latency(&self, duration_secs: f64);
}
impl TrackerMetricsSink for NopSink {
    fn set_tracked(&self, _count: u64) {}
    fn inc_completed(&self) {}
    fn inc_batch_assigned(&self) {}
    fn inc_abandoned(&self) {}
    fn observe_completion_latency(&self, _duration_secs: f64) {}
}

/// Metrics for a single destination chain executor (C8).
pub trait ChainMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the counter of batch pushes attempted on a chain.
    fn inc_push_attempt(&self, chain_id: &str);
    /// Increments the counter of batch pushes that succeeded on a chain.
    fn inc_push_success(&self, chain_id: &str);
    /// Increments the counter of batch pushes that failed on a chain.
    fn inc_push_failure(&self, chain_id: &str, reason: &'static str);
    /// Observes the duration of a single push in seconds.
    fn observe_push_duration(&self, chain_id: &str, duration_secs: f64);
    /// Sets a gauge indicating whether a chain is currently considered healthy.
    fn set_chain_health(&self, chain_id: &str, healthy: bool);
}
impl ChainMetricsSink for NopSink {
    fn inc_push_attempt(&self, _chain_id: &str) {}
    fn inc_push_success(&self, _chain_id: &str) {}
    fn inc_push_failure(&self, _chain_id: &str, _reason: &'static str) {}
    fn observe_push_duration(&self, _chain_id: &str, _duration_secs: f64) {}
    fn set_chain_health(&self, _chain_id: &str, _healthy: bool) {}
}

/// Metrics for the push service queue (C10).
pub trait PushMetricsSink: Send + Sync + std::fmt::Debug {
    /// Sets the gauge of batches currently pending in the push queue.
    fn set_pending_batches(&self, count: u64);
    /// Sets the gauge of batches currently held in the failed-retry map.
    fn set_failed_retry_batches(&self, count: u64);
    /// Increments the counter of batches discovered from the completion tracker.
    fn inc_batch_discovered(&self);
    /// Increments the counter of batches that fully completed across all chains.
    fn inc_batch_completed(&self);
    /// Increments the counter of batches abandoned after exhausting retries.
    fn inc_batch_abandoned(&self);
}
impl PushMetricsSink for NopSink {
    fn set_pending_batches(&self, _count: u64) {}
    fn set_failed_retry_batches(&self, _count: u64) {}
    fn inc_batch_discovered(&self) {}
    fn inc_batch_completed(&self) {}
    fn inc_batch_abandoned(&self) {}
}

/// A sink for recording structured error metrics.
pub trait ErrorMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments a counter for a specific error, categorized by its kind and variant.
    fn inc_error(&self, kind: &'static str, variant: &'static str);
}
impl ErrorMetricsSink for NopSink {
    fn inc_error(&self, _kind: &'static str, _variant: &'static str) {}
}

/// A unified sink that implements all domain-specific traits, providing a single
/// point of implementation for metrics backends like Prometheus.
pub trait MetricsSink:
    SchedulerMetricsSink
    + SequenceMetricsSink
    + TrackerMetricsSink
    + ChainMetricsSink
    + PushMetricsSink
    + ErrorMetricsSink
{
}

// Blanket implementation to allow any type that implements all sub-traits
// to be used as a `MetricsSink`.
impl<T> MetricsSink for T where
    T: SchedulerMetricsSink
        + SequenceMetricsSink
        + TrackerMetricsSink
        + ChainMetricsSink
        + PushMetricsSink
        + ErrorMetricsSink
{
}
