// Path: crates/bridge-push/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # SEDA Bridge Push Service (C10)
//!
//! Four-phase loop over batch-ready batches: discover newly assigned batch
//! numbers, fetch and fan each one out across every configured destination
//! chain, retry partial failures with backoff, and age out processed-batch
//! dedup entries.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use seda_bridge_batch::BatchFetcher;
use seda_bridge_chain::ChainManager;
use seda_bridge_evm::EvmClient;
use seda_bridge_retry::BackoffConfig;
use seda_bridge_telemetry::push_metrics;
use seda_bridge_types::config::{BatchFetchConfig, PushConfig};
use seda_bridge_types::events::PushEvent;
use seda_bridge_upstream::SedaClient;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

/// Backoff applied to a batch that failed on one or more chains: `min(5000 *
/// 2^(attempts-1), 60000)`, capped at 3 attempts.
const RETRY_BACKOFF: BackoffConfig = BackoffConfig {
    max_attempts: 3,
    initial_delay: Duration::from_millis(5_000),
    multiplier: 2.0,
    max_delay: Duration::from_millis(60_000),
};

/// A source of newly batch-ready batch numbers, satisfied by the completion
/// tracker's (C6) discovery queue.
#[async_trait]
pub trait BatchDiscoverySource: Send + Sync {
    /// Drains and returns batch numbers discovered since the last call.
    async fn take_newly_ready_batches(&self) -> Vec<u64>;
}

#[async_trait]
impl<C, B> BatchDiscoverySource for seda_bridge_tracker::CompletionTracker<C, B>
where
    C: SedaClient + 'static,
    B: seda_bridge_tracker::BatchWindowSource + 'static,
{
    async fn take_newly_ready_batches(&self) -> Vec<u64> {
        self.take_newly_ready_batches().await
    }
}

#[derive(Debug, Clone)]
struct FailedEntry {
    attempts: u32,
    next_retry_at: Instant,
}

/// Snapshot of the push service's internal queues.
#[derive(Debug, Clone, Copy)]
pub struct PushServiceStats {
    /// Batches currently awaiting their first processing attempt.
    pub pending: u64,
    /// Batches currently held in the failed-retry map.
    pub failed_retry: u64,
    /// Batches currently tracked in the processed-dedup set.
    pub processed: u64,
}

/// Discovers, pushes, retries, and deduplicates batch anchoring (C10).
pub struct PushService<C, D, E>
where
    C: SedaClient,
    D: BatchDiscoverySource,
    E: EvmClient,
{
    batch_fetcher: BatchFetcher<Arc<C>>,
    discovery: Arc<D>,
    chain_manager: Arc<ChainManager<E>>,
    config: PushConfig,
    pending: Mutex<HashSet<u64>>,
    failed_retry: Mutex<HashMap<u64, FailedEntry>>,
    processed: Mutex<HashMap<u64, Instant>>,
    events: Option<broadcast::Sender<PushEvent>>,
    shutdown: Mutex<Option<tokio::sync::watch::Sender<bool>>>,
}

impl<C, D, E> PushService<C, D, E>
where
    C: SedaClient + 'static,
    D: BatchDiscoverySource + 'static,
    E: EvmClient + 'static,
{
    /// Builds a push service backed by `client` (for batch lookups, wrapped in
    /// the batch fetcher's poll-then-fall-back strategy, C7), `discovery` (the
    /// tracker's ready-batch queue), and `chain_manager` (C9 fan-out). `events`,
    /// if set, receives [`PushEvent`]s as they occur.
    pub fn new(
        client: Arc<C>,
        discovery: Arc<D>,
        chain_manager: Arc<ChainManager<E>>,
        config: PushConfig,
        batch_fetch_config: BatchFetchConfig,
        events: Option<broadcast::Sender<PushEvent>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            batch_fetcher: BatchFetcher::new(client, batch_fetch_config),
            discovery,
            chain_manager,
            config,
            pending: Mutex::new(HashSet::new()),
            failed_retry: Mutex::new(HashMap::new()),
            processed: Mutex::new(HashMap::new()),
            events,
            shutdown: Mutex::new(None),
        })
    }

    fn emit(&self, event: PushEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Starts the periodic four-phase loop as a background task.
    pub async fn start(self: &Arc<Self>) {
        let (tx, rx) = tokio::sync::watch::channel(false);
        *self.shutdown.lock().await = Some(tx);
        let this = Arc::clone(self);
        self.emit(PushEvent::ServiceStarted);
        tokio::spawn(async move { this.run(rx).await });
    }

    /// Signals the background loop to stop after its current tick.
    pub async fn stop(&self) {
        if let Some(tx) = self.shutdown.lock().await.take() {
            let _ = tx.send(true);
        }
        self.emit(PushEvent::ServiceStopped);
    }

    /// Returns a snapshot of the internal queue sizes.
    pub async fn stats(&self) -> PushServiceStats {
        PushServiceStats {
            pending: self.pending.lock().await.len() as u64,
            failed_retry: self.failed_retry.lock().await.len() as u64,
            processed: self.processed.lock().await.len() as u64,
        }
    }

    async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.batch_polling.interval_ms.max(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Runs one full discover/process/retry/cleanup pass.
    pub async fn tick(self: &Arc<Self>) {
        self.discover().await;
        self.process_pending().await;
        self.process_retries().await;
        self.cleanup_processed().await;
        let stats = self.stats().await;
        push_metrics().set_pending_batches(stats.pending);
        push_metrics().set_failed_retry_batches(stats.failed_retry);
    }

    async fn discover(&self) {
        let ready = self.discovery.take_newly_ready_batches().await;
        if ready.is_empty() {
            return;
        }
        let already_processed = self.processed.lock().await;
        let mut pending = self.pending.lock().await;
        for batch_number in ready {
            if already_processed.contains_key(&batch_number) {
                continue;
            }
            if pending.insert(batch_number) {
                info!(target = "push", batch_number, "batch discovered");
                push_metrics().inc_batch_discovered();
                self.emit(PushEvent::BatchDiscovered { batch_number });
            }
        }
    }

    async fn process_pending(self: &Arc<Self>) {
        let batch_numbers: Vec<u64> = self.pending.lock().await.iter().copied().collect();
        for batch_number in batch_numbers {
            self.process_one(batch_number, 0).await;
        }
    }

    async fn process_retries(self: &Arc<Self>) {
        let now = Instant::now();
        let due: Vec<(u64, u32)> = {
            let failed = self.failed_retry.lock().await;
            failed
                .iter()
                .filter(|(_, entry)| entry.next_retry_at <= now)
                .map(|(batch_number, entry)| (*batch_number, entry.attempts))
                .collect()
        };
        for (batch_number, attempts) in due {
            self.process_one(batch_number, attempts).await;
        }
    }

    async fn process_one(self: &Arc<Self>, batch_number: u64, prior_attempts: u32) {
        let outcome = match self.batch_fetcher.fetch_by_number(batch_number, "push").await {
            Ok(outcome) => outcome,
            Err(seda_bridge_types::error::BatchFetchError::Unavailable(_)) => {
                warn!(target = "push", batch_number, "batch vanished; no signed batch or fallback available");
                self.abandon(batch_number).await;
                return;
            }
            Err(err) => {
                warn!(target = "push", batch_number, error = %err, "batch fetch failed; will retry");
                self.schedule_retry(batch_number, prior_attempts).await;
                return;
            }
        };
        if outcome.is_fallback() {
            warn!(target = "push", batch_number, "assigned batch never signed in time; substituting latest signed batch");
            self.emit(PushEvent::BatchFellBackToLatestSigned { batch_number });
        }
        let batch = outcome.batch();

        for chain_id in self.chain_manager.chain_ids() {
            self.emit(PushEvent::BatchPushStarted { batch_number, chain_id: chain_id.to_string() });
        }
        let result = self.chain_manager.push_batch_to_all_chains(batch).await;
        for push in &result.results {
            if push.success {
                self.emit(PushEvent::BatchPushSuccess {
                    batch_number,
                    chain_id: push.chain_id.clone(),
                    tx_hash: push.tx_hash.clone().unwrap_or_default(),
                });
            } else {
                self.emit(PushEvent::BatchPushFailed {
                    batch_number,
                    chain_id: push.chain_id.clone(),
                    error: push.error.clone().unwrap_or_default(),
                });
            }
            if let Some(healthy) = push.health_transition {
                self.emit(PushEvent::ChainHealthChanged { chain_id: push.chain_id.clone(), healthy });
            }
        }

        self.emit(PushEvent::BatchCompleted {
            batch_number,
            success_count: result.success_count,
            failure_count: result.failure_count,
        });

        if result.failure_count == 0 {
            info!(target = "push", batch_number, "batch fully anchored on all configured chains");
            push_metrics().inc_batch_completed();
            self.pending.lock().await.remove(&batch_number);
            self.failed_retry.lock().await.remove(&batch_number);
            self.processed.lock().await.entry(batch_number).or_insert_with(Instant::now);
        } else {
            self.schedule_retry(batch_number, prior_attempts).await;
        }
    }

    async fn schedule_retry(&self, batch_number: u64, prior_attempts: u32) {
        let attempts = prior_attempts + 1;
        self.pending.lock().await.remove(&batch_number);
        if attempts > RETRY_BACKOFF.max_attempts {
            warn!(target = "push", batch_number, attempts, "abandoning batch after exhausting retries");
            self.abandon(batch_number).await;
            return;
        }
        let delay = RETRY_BACKOFF.delay_for_attempt(attempts);
        self.failed_retry
            .lock()
            .await
            .insert(batch_number, FailedEntry { attempts, next_retry_at: Instant::now() + delay });
    }

    async fn abandon(&self, batch_number: u64) {
        self.pending.lock().await.remove(&batch_number);
        self.failed_retry.lock().await.remove(&batch_number);
        push_metrics().inc_batch_abandoned();
        self.emit(PushEvent::ServiceError { error: format!("batch {batch_number} abandoned after exhausting retries") });
    }

    async fn cleanup_processed(&self) {
        let max_age = Duration::from_millis(self.config.batch_polling.max_batch_age_ms);
        let mut processed = self.processed.lock().await;
        processed.retain(|_, first_seen_at| first_seen_at.elapsed() < max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use seda_bridge_chain::ChainExecutor;
    use seda_bridge_evm::client::{BatchCalldata, EvmError, PostBatchReceipt};
    use seda_bridge_evm::SignatureBundle;
    use seda_bridge_types::config::{ChainConfig, ConfirmationsConfig, ContractsConfig, GasConfig, RetryConfig};
    use seda_bridge_types::error::SequenceError;
    use seda_bridge_types::model::{Batch, BatchSignature, ValidatorEntry};
    use seda_bridge_upstream::{AwaitOptions, BatchAssignment, DataResultOutcome, PostDataRequestInput, PostDataRequestOutput, QueryBatchOutput, SedaQueryError, SedaSubmitError};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::sync::Mutex as TokioMutex;

    struct FixedDiscovery {
        batches: TokioMutex<Vec<u64>>,
    }
    #[async_trait]
    impl BatchDiscoverySource for FixedDiscovery {
        async fn take_newly_ready_batches(&self) -> Vec<u64> {
            std::mem::take(&mut *self.batches.lock().await)
        }
    }

    struct FakeSedaClient {
        batches: HashMap<u64, Batch>,
    }
    #[async_trait]
    impl SedaClient for FakeSedaClient {
        async fn post_data_request(&self, _: PostDataRequestInput, _: u64) -> Result<PostDataRequestOutput, SedaSubmitError> {
            unreachable!()
        }
        async fn await_data_result(&self, _: &str, _: u64, _: AwaitOptions) -> Result<DataResultOutcome, SedaQueryError> {
            unreachable!()
        }
        async fn query_account_sequence(&self, _: &str) -> Result<u64, SequenceError> {
            unreachable!()
        }
        async fn query_data_result(&self, _: &str, _: u64) -> Result<Option<BatchAssignment>, SedaQueryError> {
            unreachable!()
        }
        async fn query_batch(&self, batch_number: u64, _: bool) -> Result<Option<QueryBatchOutput>, SedaQueryError> {
            Ok(self.batches.get(&batch_number).cloned().map(|batch| QueryBatchOutput { batch }))
        }
    }

    struct ScriptedEvm {
        succeed: AtomicBool,
        post_calls: AtomicU32,
    }
    #[async_trait]
    impl EvmClient for ScriptedEvm {
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
            self.post_calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed.load(Ordering::SeqCst) {
                Ok(PostBatchReceipt { tx_hash: "0xok".into(), block_number: 1, gas_used: 21_000 })
            } else {
                Err(EvmError::Rpc("down".into()))
            }
        }
        async fn check_health(&self) -> bool {
            self.succeed.load(Ordering::SeqCst)
        }
    }

    fn chain_config() -> ChainConfig {
        ChainConfig {
            chain_id: "1".into(),
            name: "test".into(),
            rpc_endpoint: "http://localhost".into(),
            fallback_rpc_endpoints: vec![],
            contracts: ContractsConfig { seda_core: "0xcore".into(), seda_prover: "0xprover".into() },
            gas: GasConfig::default(),
            confirmations: ConfirmationsConfig::default(),
            retry: RetryConfig { max_attempts: 1, initial_delay_ms: 1, backoff_multiplier: 1.0, max_delay_ms: 1 },
        }
    }

    fn fast_batch_fetch_config() -> BatchFetchConfig {
        BatchFetchConfig { max_retries: 1, polling_interval_ms: 1 }
    }

    fn signed_batch(number: u64) -> Batch {
        Batch {
            batch_number: number,
            batch_id: [3u8; 32],
            block_height: 10,
            data_result_root: [1u8; 32],
            validator_root: [1u8; 32],
            signatures: vec![],
            validator_entries: vec![],
            data_request_ids: vec!["dr-1".into()],
        }
    }

    #[tokio::test]
    async fn discovered_batch_not_fully_anchored_moves_to_retry_map() {
        let mut batch = signed_batch(1);
        batch.signatures.push(BatchSignature {
            validator_address: "v1".into(),
            raw_signature: [0u8; 65],
            eth_address: [1u8; 20],
            voting_power_percentage: 100.0,
            merkle_proof: vec![],
        });
        batch.validator_entries.push(ValidatorEntry { validator_address: "v1".into(), eth_address: [1u8; 20], voting_power_percentage: 100.0 });

        let client = Arc::new(FakeSedaClient { batches: HashMap::from([(1u64, batch)]) });
        let discovery = Arc::new(FixedDiscovery { batches: TokioMutex::new(vec![1]) });
        let executor = ChainExecutor::new(chain_config(), ScriptedEvm { succeed: AtomicBool::new(false), post_calls: AtomicU32::new(0) }, [0u8; 32]);
        let manager = Arc::new(ChainManager::new(vec![executor], 5));

        let service = PushService::new(client, discovery, manager, PushConfig::default(), fast_batch_fetch_config(), None);
        service.tick().await;

        let stats = service.stats().await;
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.failed_retry, 1);
        assert_eq!(stats.processed, 0);
    }

    #[tokio::test]
    async fn push_emits_batch_push_started_per_chain_before_fan_out() {
        let client = Arc::new(FakeSedaClient { batches: HashMap::from([(1u64, signed_batch(1))]) });
        let discovery = Arc::new(FixedDiscovery { batches: TokioMutex::new(vec![1]) });
        let executor = ChainExecutor::new(chain_config(), ScriptedEvm { succeed: AtomicBool::new(true), post_calls: AtomicU32::new(0) }, [0u8; 32]);
        let manager = Arc::new(ChainManager::new(vec![executor], 5));

        let (tx, mut rx) = broadcast::channel(16);
        let service = PushService::new(client, discovery, manager, PushConfig::default(), fast_batch_fetch_config(), Some(tx));
        service.tick().await;

        let mut saw_started = false;
        while let Ok(event) = rx.try_recv() {
            if let PushEvent::BatchPushStarted { batch_number, chain_id } = event {
                assert_eq!(batch_number, 1);
                assert_eq!(chain_id, "1");
                saw_started = true;
                break;
            }
        }
        assert!(saw_started, "expected a BatchPushStarted event before the push completed");
    }

    #[tokio::test]
    async fn vanished_batch_is_abandoned_without_retry() {
        let client = Arc::new(FakeSedaClient { batches: HashMap::new() });
        let discovery = Arc::new(FixedDiscovery { batches: TokioMutex::new(vec![99]) });
        let executor = ChainExecutor::new(chain_config(), ScriptedEvm { succeed: AtomicBool::new(true), post_calls: AtomicU32::new(0) }, [0u8; 32]);
        let manager = Arc::new(ChainManager::new(vec![executor], 5));

        let service = PushService::new(client, discovery, manager, PushConfig::default(), fast_batch_fetch_config(), None);
        service.tick().await;

        let stats = service.stats().await;
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.failed_retry, 0);
    }

    #[tokio::test]
    async fn schedule_retry_runs_three_attempts_at_5_10_20_seconds_then_abandons() {
        let client = Arc::new(FakeSedaClient { batches: HashMap::new() });
        let discovery = Arc::new(FixedDiscovery { batches: TokioMutex::new(vec![]) });
        let executor = ChainExecutor::new(chain_config(), ScriptedEvm { succeed: AtomicBool::new(true), post_calls: AtomicU32::new(0) }, [0u8; 32]);
        let manager = Arc::new(ChainManager::new(vec![executor], 5));
        let service = PushService::new(client, discovery, manager, PushConfig::default(), fast_batch_fetch_config(), None);

        let before = Instant::now();
        service.schedule_retry(1, 0).await;
        let first = service.failed_retry.lock().await.get(&1).cloned().expect("retry 1 scheduled");
        assert_eq!(first.attempts, 1);
        assert!(first.next_retry_at.duration_since(before) >= Duration::from_millis(4_900));
        assert!(first.next_retry_at.duration_since(before) < Duration::from_millis(6_000));

        service.schedule_retry(1, 1).await;
        let second = service.failed_retry.lock().await.get(&1).cloned().expect("retry 2 scheduled");
        assert_eq!(second.attempts, 2);
        assert!(second.next_retry_at.duration_since(before) >= Duration::from_millis(9_900));
        assert!(second.next_retry_at.duration_since(before) < Duration::from_millis(11_000));

        service.schedule_retry(1, 2).await;
        let third = service.failed_retry.lock().await.get(&1).cloned().expect("retry 3 scheduled");
        assert_eq!(third.attempts, 3);
        assert!(third.next_retry_at.duration_since(before) >= Duration::from_millis(19_900));
        assert!(third.next_retry_at.duration_since(before) < Duration::from_millis(21_000));

        service.schedule_retry(1, 3).await;
        assert!(service.failed_retry.lock().await.get(&1).is_none(), "abandoned after the third retry fails");
    }

    #[tokio::test]
    async fn cleanup_ages_out_processed_entries_past_max_age() {
        let client = Arc::new(FakeSedaClient { batches: HashMap::new() });
        let discovery = Arc::new(FixedDiscovery { batches: TokioMutex::new(vec![]) });
        let executor = ChainExecutor::new(chain_config(), ScriptedEvm { succeed: AtomicBool::new(true), post_calls: AtomicU32::new(0) }, [0u8; 32]);
        let manager = Arc::new(ChainManager::new(vec![executor], 5));

        let mut config = PushConfig::default();
        config.batch_polling.max_batch_age_ms = 1;
        let service = PushService::new(client, discovery, manager, config, fast_batch_fetch_config(), None);
        service.processed.lock().await.insert(5, Instant::now() - Duration::from_millis(50));
        service.cleanup_processed().await;
        assert_eq!(service.stats().await.processed, 0);
    }
}
