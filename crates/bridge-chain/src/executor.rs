// Path: crates/bridge-chain/src/executor.rs
//! Chain Executor (C8): per-destination-chain batch pushes with retry, gas
//! estimation, idempotency caching, and consecutive-failure health tracking
//!.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use seda_bridge_evm::client::BatchCalldata;
use seda_bridge_evm::{process_batch_signatures, EvmClient, EvmError};
use seda_bridge_retry::{retry, BackoffConfig};
use seda_bridge_telemetry::chain_metrics;
use seda_bridge_types::config::ChainConfig;
use seda_bridge_types::model::{Batch, ChainBatchPhase, ChainBatchStatus};
use tokio::sync::Mutex;
use tracing::{info, warn};

const IS_PUSHED_CACHE_TTL: Duration = Duration::from_secs(60);
const HEALTH_FAILURE_THRESHOLD: u32 = 3;

/// The result of one [`ChainExecutor::push_batch`] call.
#[derive(Debug, Clone)]
pub struct BatchPushResult {
    /// The destination chain's id.
    pub chain_id: String,
    /// Whether the batch is now anchored on this chain.
    pub success: bool,
    /// The destination transaction hash, if a transaction was submitted.
    pub tx_hash: Option<String>,
    /// Gas consumed by the submission, `0` for idempotent/no-op pushes.
    pub gas_used: u64,
    /// Wall-clock duration of the push attempt, in milliseconds.
    pub duration_ms: u64,
    /// A human-readable error description, if the push failed.
    pub error: Option<String>,
    /// Set when this push caused a health classification change: `Some(true)`
    /// on the first post-outage success, `Some(false)` on the failure that
    /// crossed the consecutive-failure threshold.
    pub health_transition: Option<bool>,
}

#[derive(Debug, Default, Clone, Copy)]
struct ChainStats {
    total: u64,
    successful: u64,
    failed: u64,
    total_push_time_ms: u64,
    consecutive_failures: u32,
    last_push_time_ms: Option<u64>,
}

/// Point-in-time stats for one chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainExecutorStats {
    /// Total push attempts made.
    pub total: u64,
    /// Pushes that succeeded.
    pub successful: u64,
    /// Pushes that failed.
    pub failed: u64,
    /// Sum of all push durations, in milliseconds.
    pub total_push_time_ms: u64,
    /// Current run of consecutive failures.
    pub consecutive_failures: u32,
    /// Wall-clock time of the last push attempt, in milliseconds since the epoch.
    pub last_push_time_ms: Option<u64>,
}

/// One instance per destination chain (C8).
pub struct ChainExecutor<E: EvmClient> {
    config: ChainConfig,
    client: E,
    domain_separator: [u8; 32],
    is_pushed_cache: Mutex<HashMap<u64, (bool, Instant)>>,
    status_cache: Mutex<HashMap<u64, ChainBatchStatus>>,
    stats: Mutex<ChainStats>,
}

impl<E: EvmClient> ChainExecutor<E> {
    /// Builds an executor for `config.chain_id`, backed by `client`.
    ///
    /// `domain_separator` scopes the validator merkle leaves to this chain, so
    /// a signature replayed across chains doesn't produce an identical tree.
    pub fn new(config: ChainConfig, client: E, domain_separator: [u8; 32]) -> Arc<Self> {
        Arc::new(Self {
            config,
            client,
            domain_separator,
            is_pushed_cache: Mutex::new(HashMap::new()),
            status_cache: Mutex::new(HashMap::new()),
            stats: Mutex::new(ChainStats::default()),
        })
    }

    /// The chain id this executor is bound to.
    pub fn chain_id(&self) -> &str {
        &self.config.chain_id
    }

    /// Checks (with a TTL-bounded cache) whether `batch_number` is already
    /// anchored on this chain.
    pub async fn is_batch_pushed(&self, batch_number: u64) -> Result<bool, EvmError> {
        {
            let cache = self.is_pushed_cache.lock().await;
            if let Some((value, seen_at)) = cache.get(&batch_number) {
                if seen_at.elapsed() < IS_PUSHED_CACHE_TTL {
                    return Ok(*value);
                }
            }
        }
        let pushed = self.client.is_batch_pushed(batch_number).await?;
        self.is_pushed_cache.lock().await.insert(batch_number, (pushed, Instant::now()));
        Ok(pushed)
    }

    /// Returns the cached status for `batch_number`, or a `failed` status
    /// carrying the query error if no cached entry exists and the underlying
    /// query itself errors.
    pub async fn get_batch_status(&self, batch_number: u64) -> ChainBatchStatus {
        if let Some(status) = self.status_cache.lock().await.get(&batch_number).cloned() {
            return status;
        }
        match self.is_batch_pushed(batch_number).await {
            Ok(true) => ChainBatchStatus { phase: ChainBatchPhase::Pushed, ..Default::default() },
            Ok(false) => ChainBatchStatus::default(),
            Err(err) => ChainBatchStatus {
                phase: ChainBatchPhase::Failed,
                last_error: Some(err.to_string()),
                ..Default::default()
            },
        }
    }

    /// A liveness probe against the chain RPC.
    pub async fn check_health(&self) -> bool {
        self.client.check_health().await
    }

    /// Returns a snapshot of this executor's push statistics.
    pub async fn stats(&self) -> ChainExecutorStats {
        let s = *self.stats.lock().await;
        ChainExecutorStats {
            total: s.total,
            successful: s.successful,
            failed: s.failed,
            total_push_time_ms: s.total_push_time_ms,
            consecutive_failures: s.consecutive_failures,
            last_push_time_ms: s.last_push_time_ms,
        }
    }

    /// Pushes `batch` to this chain.
    pub async fn push_batch(&self, batch: &Batch) -> BatchPushResult {
        let start = Instant::now();
        chain_metrics().inc_push_attempt(&self.config.chain_id);

        match self.is_batch_pushed(batch.batch_number).await {
            Ok(true) => {
                info!(target = "chain", chain_id = %self.config.chain_id, batch_number = batch.batch_number, "batch already pushed");
                return self.finish(batch.batch_number, true, Some("already-pushed".to_string()), 0, start, None).await;
            }
            Ok(false) => {}
            Err(err) => {
                warn!(target = "chain", chain_id = %self.config.chain_id, error = %err, "is_batch_pushed query failed; proceeding with push attempt");
            }
        }

        let bundles = match process_batch_signatures(batch, &self.domain_separator) {
            Ok(bundles) => bundles,
            Err(err) => {
                warn!(target = "chain", chain_id = %self.config.chain_id, batch_number = batch.batch_number, error = %err, "batch rejected before submission");
                return self
                    .finish(batch.batch_number, false, None, 0, start, Some(err.to_string()))
                    .await;
            }
        };

        let calldata = BatchCalldata {
            batch_number: batch.batch_number,
            batch_id: batch.batch_id,
            data_result_root: batch.data_result_root,
            validator_root: batch.validator_root,
        };

        let backoff = BackoffConfig {
            max_attempts: self.config.retry.max_attempts,
            initial_delay: Duration::from_millis(self.config.retry.initial_delay_ms),
            multiplier: self.config.retry.backoff_multiplier,
            max_delay: Duration::from_millis(self.config.retry.max_delay_ms),
        };

        let gas_limit = self.config.gas.batch_push_gas_limit;
        let push_result = retry(backoff, |_attempt| async {
            let _ = self.client.estimate_gas(&calldata, &bundles).await;
            self.client.post_batch(&calldata, &bundles, gas_limit).await
        })
        .await;

        match push_result {
            Ok(receipt) => {
                self.finish(batch.batch_number, true, Some(receipt.tx_hash), receipt.gas_used, start, None).await
            }
            Err(err) => self.finish(batch.batch_number, false, None, 0, start, Some(err.to_string())).await,
        }
    }

    async fn finish(
        &self,
        batch_number: u64,
        success: bool,
        tx_hash: Option<String>,
        gas_used: u64,
        start: Instant,
        error: Option<String>,
    ) -> BatchPushResult {
        let duration = start.elapsed();
        let duration_ms = duration.as_millis() as u64;
        chain_metrics().observe_push_duration(&self.config.chain_id, duration.as_secs_f64());

        let health_transition = {
            let mut stats = self.stats.lock().await;
            stats.total += 1;
            stats.total_push_time_ms += duration_ms;
            stats.last_push_time_ms = Some(now_ms());
            if success {
                chain_metrics().inc_push_success(&self.config.chain_id);
                stats.successful += 1;
                let was_unhealthy = stats.consecutive_failures >= HEALTH_FAILURE_THRESHOLD;
                stats.consecutive_failures = 0;
                if was_unhealthy {
                    chain_metrics().set_chain_health(&self.config.chain_id, true);
                    Some(true)
                } else {
                    None
                }
            } else {
                chain_metrics().inc_push_failure(&self.config.chain_id, "push_failed");
                stats.failed += 1;
                stats.consecutive_failures += 1;
                if stats.consecutive_failures == HEALTH_FAILURE_THRESHOLD {
                    chain_metrics().set_chain_health(&self.config.chain_id, false);
                    Some(false)
                } else {
                    None
                }
            }
        };

        let status = ChainBatchStatus {
            phase: if success { ChainBatchPhase::Pushed } else { ChainBatchPhase::Failed },
            tx_hash: tx_hash.clone(),
            block_number: None,
            confirmations: 0,
            retry_count: 0,
            last_attempt_at_ms: Some(now_ms()),
            next_retry_at_ms: None,
            last_error: error.clone(),
        };
        self.status_cache.lock().await.insert(batch_number, status);

        BatchPushResult {
            chain_id: self.config.chain_id.clone(),
            success,
            tx_hash,
            gas_used,
            duration_ms,
            error,
            health_transition,
        }
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use seda_bridge_evm::client::PostBatchReceipt;
    use seda_bridge_evm::SignatureBundle;
    use seda_bridge_types::model::{BatchSignature, ValidatorEntry};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_chain_config() -> ChainConfig {
        ChainConfig {
            chain_id: "1".into(),
            name: "test".into(),
            rpc_endpoint: "http://localhost".into(),
            fallback_rpc_endpoints: vec![],
            contracts: seda_bridge_types::config::ContractsConfig { seda_core: "0xcore".into(), seda_prover: "0xprover".into() },
            gas: Default::default(),
            confirmations: Default::default(),
            retry: seda_bridge_types::config::RetryConfig { max_attempts: 1, initial_delay_ms: 1, backoff_multiplier: 1.0, max_delay_ms: 1 },
        }
    }

    fn unsigned_batch() -> Batch {
        Batch {
            batch_number: 42,
            batch_id: [9u8; 32],
            block_height: 1,
            data_result_root: [1u8; 32],
            validator_root: [1u8; 32],
            signatures: vec![],
            validator_entries: vec![],
            data_request_ids: vec![],
        }
    }

    struct AlwaysPushedClient;
    #[async_trait]
    impl EvmClient for AlwaysPushedClient {
        async fn get_seda_prover(&self) -> Result<String, EvmError> {
            Ok("0xprover".into())
        }
        async fn get_last_batch_height(&self) -> Result<u64, EvmError> {
            Ok(41)
        }
        async fn is_batch_pushed(&self, _: u64) -> Result<bool, EvmError> {
            Ok(true)
        }
        async fn estimate_gas(&self, _: &BatchCalldata, _: &[SignatureBundle]) -> Result<u64, EvmError> {
            Ok(21_000)
        }
        async fn post_batch(&self, _: &BatchCalldata, _: &[SignatureBundle], _: u64) -> Result<PostBatchReceipt, EvmError> {
            unreachable!("already-pushed batches must not submit")
        }
        async fn check_health(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn push_batch_is_idempotent_when_already_pushed() {
        let executor = ChainExecutor::new(test_chain_config(), AlwaysPushedClient, [0u8; 32]);
        let result = executor.push_batch(&unsigned_batch()).await;
        assert!(result.success);
        assert_eq!(result.tx_hash.as_deref(), Some("already-pushed"));
        assert_eq!(result.gas_used, 0);
    }

    struct FailingClient {
        calls: AtomicU32,
    }
    #[async_trait]
    impl EvmClient for FailingClient {
        async fn get_seda_prover(&self) -> Result<String, EvmError> {
            Ok("0xprover".into())
        }
        async fn get_last_batch_height(&self) -> Result<u64, EvmError> {
            Ok(0)
        }
        async fn is_batch_pushed(&self, _: u64) -> Result<bool, EvmError> {
            Ok(false)
        }
        async fn estimate_gas(&self, _: &BatchCalldata, _: &[SignatureBundle]) -> Result<u64, EvmError> {
            Ok(21_000)
        }
        async fn post_batch(&self, _: &BatchCalldata, _: &[SignatureBundle], _: u64) -> Result<PostBatchReceipt, EvmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EvmError::Rpc("rpc down".into()))
        }
        async fn check_health(&self) -> bool {
            false
        }
    }

    fn signed_batch() -> Batch {
        Batch {
            signatures: vec![BatchSignature {
                validator_address: "v1".into(),
                raw_signature: [0u8; 65],
                eth_address: [1u8; 20],
                voting_power_percentage: 100.0,
                merkle_proof: vec![],
            }],
            validator_entries: vec![ValidatorEntry {
                validator_address: "v1".into(),
                eth_address: [1u8; 20],
                voting_power_percentage: 100.0,
            }],
            ..unsigned_batch()
        }
    }

    #[tokio::test]
    async fn push_batch_rejects_unsigned_batch_before_submitting() {
        let executor = ChainExecutor::new(test_chain_config(), FailingClient { calls: AtomicU32::new(0) }, [0u8; 32]);
        let result = executor.push_batch(&unsigned_batch()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("batch has no signatures"));
    }

    #[tokio::test]
    async fn three_consecutive_failures_trigger_unhealthy_transition() {
        let client = FailingClient { calls: AtomicU32::new(0) };
        let executor = ChainExecutor::new(test_chain_config(), client, [0u8; 32]);
        // invalid signature -> recovery fails before hitting post_batch, still counts as a failed push.
        let mut batch = signed_batch();
        batch.validator_root = [1u8; 32];
        let r1 = executor.push_batch(&batch).await;
        assert!(r1.health_transition.is_none());
        let r2 = executor.push_batch(&batch).await;
        assert!(r2.health_transition.is_none());
        let r3 = executor.push_batch(&batch).await;
        assert_eq!(r3.health_transition, Some(false));
    }
}
