// Path: crates/bridge-chain/src/manager.rs
//! Chain Manager (C9): fans a signed batch out to every configured
//! destination chain in parallel, bounded by `max_parallel_chains`
//!.

use std::sync::Arc;

use seda_bridge_evm::EvmClient;
use seda_bridge_types::model::Batch;
use tracing::info;

use crate::executor::{BatchPushResult, ChainExecutor};

/// Aggregate outcome of pushing one batch to every configured chain.
#[derive(Debug, Clone)]
pub struct MultiChainPushResult {
    /// Per-chain results, in the same order the executors were registered.
    pub results: Vec<BatchPushResult>,
    /// Count of chains the batch was successfully pushed to.
    pub success_count: u32,
    /// Count of chains the push failed on.
    pub failure_count: u32,
    /// Total wall-clock time for the whole fan-out, in milliseconds.
    pub total_duration_ms: u64,
}

/// Fans a batch out across every configured destination chain (C9).
pub struct ChainManager<E: EvmClient> {
    executors: Vec<Arc<ChainExecutor<E>>>,
    max_parallel_chains: usize,
}

impl<E: EvmClient> ChainManager<E> {
    /// Builds a manager over `executors`, dispatching at most
    /// `max_parallel_chains` pushes concurrently.
    pub fn new(executors: Vec<Arc<ChainExecutor<E>>>, max_parallel_chains: u32) -> Self {
        Self {
            executors,
            max_parallel_chains: max_parallel_chains.max(1) as usize,
        }
    }

    /// The chain ids this manager is configured for, in registration order.
    pub fn chain_ids(&self) -> Vec<&str> {
        self.executors.iter().map(|e| e.chain_id()).collect()
    }

    /// Pushes `batch` to every configured chain, chunked by
    /// `max_parallel_chains`, and aggregates the outcome.
    pub async fn push_batch_to_all_chains(&self, batch: &Batch) -> MultiChainPushResult {
        let start = std::time::Instant::now();
        let mut results = Vec::with_capacity(self.executors.len());

        for chunk in self.executors.chunks(self.max_parallel_chains) {
            let futures = chunk.iter().map(|executor| executor.push_batch(batch));
            let chunk_results = futures::future::join_all(futures).await;
            results.extend(chunk_results);
        }

        let success_count = results.iter().filter(|r| r.success).count() as u32;
        let failure_count = results.len() as u32 - success_count;
        let total_duration_ms = start.elapsed().as_millis() as u64;

        info!(
            target = "chain_manager",
            batch_number = batch.batch_number,
            success_count,
            failure_count,
            total_duration_ms,
            "batch push fan-out complete"
        );

        MultiChainPushResult { results, success_count, failure_count, total_duration_ms }
    }

    /// Runs [`ChainExecutor::check_health`] against every chain and returns
    /// the set of chain ids that failed the probe.
    pub async fn unhealthy_chains(&self) -> Vec<String> {
        let mut unhealthy = Vec::new();
        for executor in &self.executors {
            if !executor.check_health().await {
                unhealthy.push(executor.chain_id().to_string());
            }
        }
        unhealthy
    }
}
