// Path: crates/bridge-sequence/src/validator.rs
//! Sequence Validator (C4): periodically reconciles the local sequence counter
//! with chain state and detects drift.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use seda_bridge_types::error::SequenceError;
use tracing::{debug, warn};

use crate::allocator::SequenceAllocator;

/// The chain-facing contract the validator needs: query an account's current
/// sequence, with a primary endpoint and fallback(s) tried in order.
///
/// Implemented by `seda-bridge-upstream`'s SEDA client; kept as a narrow local
/// trait here so this crate has no dependency on the upstream client crate.
#[async_trait]
pub trait SequenceSource: Send + Sync {
    /// Queries the account's current sequence from the primary endpoint, or
    /// its configured fallbacks on failure.
    async fn query_account_sequence(&self, address: &str) -> Result<u64, SequenceError>;
}

/// Default maximum sequence drift tolerated before a major resync is forced.
pub const DEFAULT_MAX_DRIFT: u64 = 2;
/// Default interval between validation attempts.
pub const DEFAULT_VALIDATION_INTERVAL: Duration = Duration::from_secs(5);

/// Drives [`SequenceAllocator::reconcile_with_chain`] from periodic chain queries.
pub struct SequenceValidator<S: SequenceSource> {
    source: S,
    allocator: Arc<SequenceAllocator>,
    address: String,
    max_drift: u64,
    interval: Duration,
}

impl<S: SequenceSource> SequenceValidator<S> {
    /// Builds a validator for `address`, backed by `source` and reconciling into `allocator`.
    pub fn new(source: S, allocator: Arc<SequenceAllocator>, address: impl Into<String>) -> Self {
        Self {
            source,
            allocator,
            address: address.into(),
            max_drift: DEFAULT_MAX_DRIFT,
            interval: DEFAULT_VALIDATION_INTERVAL,
        }
    }

    /// Overrides the default drift threshold.
    pub fn with_max_drift(mut self, max_drift: u64) -> Self {
        self.max_drift = max_drift;
        self
    }

    /// Overrides the default validation interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Performs one validation attempt: query the chain and reconcile on
    /// success, or defer until the next tick on failure.
    ///
    /// This validator never guesses a sequence on query failure — it leaves
    /// the allocator's counters untouched and logs a warning. The
    /// conservative cold-start default of `0` is applied once, by the caller
    /// that seeds the allocator before this validator ever runs, not here.
    pub async fn validate_once(&self) {
        match self.source.query_account_sequence(&self.address).await {
            Ok(chain_seq) => {
                let outcome = self.allocator.reconcile_with_chain(chain_seq, self.max_drift).await;
                debug!(address = %self.address, chain_seq, ?outcome, "sequence reconciled");
            }
            Err(err) => {
                warn!(
                    address = %self.address,
                    error = %err,
                    "account sequence query failed on all endpoints; deferring reconciliation"
                );
            }
        }
    }

    /// Runs the validation loop until `shutdown` resolves.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.validate_once().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
