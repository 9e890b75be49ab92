// Path: crates/bridge-types/src/config.rs
//! Configuration structs for every component. Parsing a config file
//! or environment into these structs is out of scope; a `Default` impl documents
//! sensible literal defaults so tests and examples can construct a
//! complete configuration without a loader.

use serde::{Deserialize, Serialize};

/// Scheduler configuration (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tick interval in milliseconds; must be > 0.
    pub interval_ms: u64,
    /// Whether the scheduler keeps firing after the first success.
    pub continuous: bool,
    /// Maximum retries per DataRequest submission.
    pub max_retries: u32,
    /// Base memo string, ≤ 256 bytes; the scheduler appends `| seq:<n>` to it.
    pub memo: String,
    /// Cosmos-sequence-specific sub-config.
    pub cosmos_sequence: CosmosSequenceConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 15_000,
            continuous: true,
            max_retries: 3,
            memo: "seda-bridge".to_string(),
            cosmos_sequence: CosmosSequenceConfig::default(),
        }
    }
}

/// Timeouts and backpressure knobs for Cosmos-style sequence handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosmosSequenceConfig {
    /// Deadline for a single `PostDataRequest` call, in milliseconds.
    pub posting_timeout_ms: u64,
    /// Deadline for awaiting a DataRequest's result, in seconds.
    pub dr_result_timeout_secs: u64,
    /// Maximum number of in-flight scheduler tasks before ticks drop or coalesce.
    pub max_queue_size: u32,
}

impl Default for CosmosSequenceConfig {
    fn default() -> Self {
        Self {
            posting_timeout_ms: 20_000,
            dr_result_timeout_secs: 90,
            max_queue_size: 100,
        }
    }
}

/// Completion tracker configuration (C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Whether batch-assignment tracking is enabled.
    pub batch_tracking_enabled: bool,
    /// Maximum retry attempts before a DataRequest is abandoned.
    pub max_retry_attempts: u32,
    /// Size of the sliding window of recent batches searched for assignment.
    pub batch_window: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
            batch_tracking_enabled: true,
            max_retry_attempts: 10,
            batch_window: 50,
        }
    }
}

/// Batch fetcher configuration (C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFetchConfig {
    /// Maximum polling attempts for a signed batch.
    pub max_retries: u32,
    /// Delay between polling attempts, in milliseconds.
    pub polling_interval_ms: u64,
}

impl Default for BatchFetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            polling_interval_ms: 3_000,
        }
    }
}

/// Push service configuration (C10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Batch discovery and processing loop configuration.
    pub batch_polling: BatchPollingConfig,
    /// Fan-out concurrency limits.
    pub concurrency: ConcurrencyConfig,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            batch_polling: BatchPollingConfig::default(),
            concurrency: ConcurrencyConfig::default(),
        }
    }
}

/// Batch discovery/processing loop timing (C10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPollingConfig {
    /// Interval between push-service loop iterations, in milliseconds.
    pub interval_ms: u64,
    /// Size of the sliding window the fetcher searches (mirrors `TrackerConfig::batch_window`).
    pub batch_window: u32,
    /// Maximum age, in milliseconds, a processed-batch dedup entry is retained.
    pub max_batch_age_ms: u64,
}

impl Default for BatchPollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            batch_window: 50,
            max_batch_age_ms: 3_600_000,
        }
    }
}

/// Fan-out concurrency limits for pushing a batch to all chains (C9, C10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Maximum number of destination chains pushed to in parallel.
    pub max_parallel_chains: u32,
    /// Maximum in-flight transactions per chain.
    pub max_transactions_per_chain: u32,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_parallel_chains: 5,
            max_transactions_per_chain: 1,
        }
    }
}

/// Per-destination-chain configuration (C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// The chain's numeric or string identifier.
    pub chain_id: String,
    /// A human-readable name for logs and metrics.
    pub name: String,
    /// Primary JSON-RPC endpoint.
    pub rpc_endpoint: String,
    /// Fallback endpoints tried in order if the primary fails.
    pub fallback_rpc_endpoints: Vec<String>,
    /// Addresses of the on-chain contracts this bridge talks to.
    pub contracts: ContractsConfig,
    /// Gas estimation and pricing knobs.
    pub gas: GasConfig,
    /// Confirmation-wait knobs.
    pub confirmations: ConfirmationsConfig,
    /// Per-chain retry/backoff knobs (C1 parameters).
    pub retry: RetryConfig,
}

/// On-chain contract addresses for one destination chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// The SEDA core contract, whose `getSedaProver()` discovers the prover address.
    pub seda_core: String,
    /// The SEDA prover contract that stores anchored batches.
    pub seda_prover: String,
}

/// Gas estimation and pricing knobs for one destination chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    /// Hard ceiling on gas price, in the chain's native unit.
    pub max_gas_price: u64,
    /// Gas limit used for the `postBatch` call.
    pub batch_push_gas_limit: u64,
    /// Multiplier applied to the estimated gas price for headroom.
    pub gas_price_multiplier: f64,
    /// Whether to use EIP-1559 fee fields instead of a legacy gas price.
    pub use_eip1559: bool,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            max_gas_price: 500_000_000_000,
            batch_push_gas_limit: 2_000_000,
            gas_price_multiplier: 1.2,
            use_eip1559: true,
        }
    }
}

/// Confirmation-wait knobs for one destination chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationsConfig {
    /// Number of confirmations required before a push is considered final.
    pub required: u32,
    /// Deadline to observe the required confirmations, in milliseconds.
    pub timeout_ms: u64,
    /// Approximate block time, used to pace confirmation polling.
    pub block_time_ms: u64,
}

impl Default for ConfirmationsConfig {
    fn default() -> Self {
        Self {
            required: 1,
            timeout_ms: 120_000,
            block_time_ms: 2_000,
        }
    }
}

/// C1 retry/backoff parameters, scoped per chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay after each attempt.
    pub backoff_multiplier: f64,
    /// Hard ceiling on the delay between attempts, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 250,
            backoff_multiplier: 1.5,
            max_delay_ms: 1_000,
        }
    }
}

/// Supervisor lifecycle configuration (C11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Lifecycle timing knobs.
    pub lifecycle: LifecycleConfig,
    /// Whether and how the EVM pusher (push service + chain manager) starts.
    pub evm_pusher: EvmPusherConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig::default(),
            evm_pusher: EvmPusherConfig::default(),
        }
    }
}

/// Supervisor lifecycle timing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Deadline for in-flight work to drain during shutdown, in milliseconds.
    pub graceful_shutdown_timeout_ms: u64,
    /// Interval between supervisor health checks, in milliseconds.
    pub health_check_interval_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            graceful_shutdown_timeout_ms: 30_000,
            health_check_interval_ms: 15_000,
        }
    }
}

/// Configuration for whether and how the EVM push subsystem runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmPusherConfig {
    /// Whether the EVM pusher subsystem is enabled at all.
    pub enabled: bool,
    /// Whether the pusher starts automatically with the supervisor.
    pub auto_start: bool,
    /// Interval between per-chain health checks, in milliseconds.
    pub health_check_interval_ms: u64,
}

impl Default for EvmPusherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_start: true,
            health_check_interval_ms: 30_000,
        }
    }
}

/// Alerting thresholds consumed by monitoring (observability only; never alters behavior).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Minimum acceptable success rate, as a percentage.
    pub min_success_rate_percent: f64,
    /// Maximum acceptable average push time, in milliseconds.
    pub max_average_push_time_ms: u64,
    /// Maximum consecutive failures before an alert fires.
    pub max_consecutive_failures: u32,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            min_success_rate_percent: 90.0,
            max_average_push_time_ms: 60_000,
            max_consecutive_failures: 3,
        }
    }
}

/// The complete configuration for one running bridge orchestrator instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Scheduler configuration.
    pub scheduler: SchedulerConfig,
    /// Completion tracker configuration.
    pub tracker: TrackerConfig,
    /// Batch fetcher configuration.
    pub batch_fetch: BatchFetchConfig,
    /// Push service configuration.
    pub push: PushConfig,
    /// Supervisor configuration.
    pub supervisor: SupervisorConfig,
    /// Alerting thresholds.
    pub alerts: AlertsConfig,
    /// One entry per enabled destination chain.
    pub chains: Vec<ChainConfig>,
}

impl Default for BridgeConfig {
    /// Every sub-config at its literal default; `chains` starts empty since no
    /// destination chain has a sensible default address. A loader overlaying a
    /// config file is expected to populate it before the node starts.
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            tracker: TrackerConfig::default(),
            batch_fetch: BatchFetchConfig::default(),
            push: PushConfig::default(),
            supervisor: SupervisorConfig::default(),
            alerts: AlertsConfig::default(),
            chains: Vec::new(),
        }
    }
}
