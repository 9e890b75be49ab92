// Path: crates/bridge-types/src/events.rs
//! Event topic definitions for the supervisor and push-service event bus (C12).
//!
//! Delivery is best-effort, single-process, and FIFO within a single topic per
//! emitter. These are plain data; the transport (a `tokio::sync::broadcast`
//! channel per family) lives in `seda-bridge-supervisor`.

use serde::{Deserialize, Serialize};

/// Aggregate health label used by the supervisor's health loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthLevel {
    /// Every sub-service reported healthy.
    Healthy,
    /// At least one sub-service is unhealthy, but not all of them.
    Degraded,
    /// Zero sub-services reported healthy.
    Unhealthy,
}

/// Supervisor-layer events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SupervisorEvent {
    /// The supervisor finished initialization.
    Initialized,
    /// The supervisor transitioned to `Running`.
    Started,
    /// The supervisor transitioned to `Stopped`.
    Stopped,
    /// The supervisor completed shutdown.
    Shutdown,
    /// A health check completed with the given aggregate level.
    HealthCheck {
        /// The aggregate health level computed this round.
        level: HealthLevel,
    },
    /// A health check found the system degraded or unhealthy.
    HealthDegraded {
        /// The aggregate health level computed this round.
        level: HealthLevel,
        /// Names of sub-services that were not healthy.
        unhealthy_services: Vec<String>,
    },
}

/// Push-layer events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PushEvent {
    /// The push service's loop started.
    ServiceStarted,
    /// The push service's loop stopped.
    ServiceStopped,
    /// A newly batch-ready batch number was discovered.
    BatchDiscovered {
        /// The discovered batch number.
        batch_number: u64,
    },
    /// The assigned batch never became signed in time; the latest signed
    /// batch was substituted instead.
    BatchFellBackToLatestSigned {
        /// The batch number that was originally assigned.
        batch_number: u64,
    },
    /// A push to a specific chain began.
    BatchPushStarted {
        /// The batch number being pushed.
        batch_number: u64,
        /// The destination chain id.
        chain_id: String,
    },
    /// A push to a specific chain succeeded.
    BatchPushSuccess {
        /// The batch number that was pushed.
        batch_number: u64,
        /// The destination chain id.
        chain_id: String,
        /// The destination transaction hash.
        tx_hash: String,
    },
    /// A push to a specific chain failed.
    BatchPushFailed {
        /// The batch number that failed to push.
        batch_number: u64,
        /// The destination chain id.
        chain_id: String,
        /// A human-readable description of the failure.
        error: String,
    },
    /// A batch finished processing across every configured chain.
    BatchCompleted {
        /// The batch number that completed.
        batch_number: u64,
        /// Number of chains the batch was anchored to successfully.
        success_count: u32,
        /// Number of chains the batch failed to anchor to.
        failure_count: u32,
    },
    /// A chain's health classification changed.
    ChainHealthChanged {
        /// The destination chain id.
        chain_id: String,
        /// Whether the chain is now considered healthy.
        healthy: bool,
    },
    /// A non-fatal error occurred within the push service.
    ServiceError {
        /// A human-readable description of the error.
        error: String,
    },
}
