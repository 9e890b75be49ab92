// Path: crates/bridge-executor/src/lib.rs
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

//! # SEDA Bridge Transaction Executor (C3)
//!
//! Executes a single `(task, attempt)` bound to one allocated sequence, classifies
//! submission failures, and drives sequence recovery on mismatch. Exactly one of
//! [`seda_bridge_sequence::SequenceAllocator::mark_success`] or
//! [`seda_bridge_sequence::SequenceAllocator::release`] runs per allocated sequence:
//! every branch of [`TxExecutor::execute`]'s match resolves the allocation before
//! returning or moving on to a fresh one.

use std::time::Duration;

use async_trait::async_trait;
use seda_bridge_retry::{with_deadline, BackoffConfig};
use seda_bridge_sequence::SequenceAllocator;
use seda_bridge_types::error::{ExecutorError, SequenceError};
use std::sync::Arc;
use tracing::{info, warn};

/// The outcome of a failed [`Submitter::submit`] call, classified so
/// [`TxExecutor::execute`] knows how to recover.
#[derive(Debug)]
pub enum SubmitFailure<T> {
    /// The upstream chain already has this exact content; `value` is whatever
    /// result it returned for the existing submission. Treated as success.
    AlreadyExists(T),
    /// The submitted sequence didn't match the account's current sequence.
    SequenceMismatch {
        /// The sequence the chain expects next.
        expected: u64,
    },
    /// Any other, non-retryable submission failure.
    Other(String),
}

/// The chain-facing contract this crate drives: submit one transaction bound to
/// `sequence`. Implemented by the scheduler's submission closure.
#[async_trait]
pub trait Submitter<T>: Send + Sync {
    /// Attempts to submit with the given sequence, returning the submission's
    /// result or a classified [`SubmitFailure`].
    async fn submit(&self, sequence: u64) -> Result<T, SubmitFailure<T>>;
}

/// Backoff used between sequence-mismatch retries: `250ms · 1.5^(k-1)`, capped at `1s`.
const MISMATCH_BACKOFF: BackoffConfig = BackoffConfig {
    max_attempts: 5,
    initial_delay: Duration::from_millis(250),
    multiplier: 1.5,
    max_delay: Duration::from_millis(1_000),
};

/// Maximum number of sequence-mismatch retries before giving up.
const MAX_SEQUENCE_RETRIES: u32 = 5;

/// Executes one submission against a sequence allocator, handling idempotency and
/// sequence-mismatch recovery (C3).
pub struct TxExecutor {
    per_attempt_timeout: Duration,
}

impl TxExecutor {
    /// Builds an executor that bounds every submission attempt by `per_attempt_timeout`.
    pub fn new(per_attempt_timeout: Duration) -> Self {
        Self { per_attempt_timeout }
    }

    /// Allocates a sequence from `allocator`, submits via `submitter`, and recovers
    /// from sequence mismatches by reconciling and re-allocating, up to
    /// [`MAX_SEQUENCE_RETRIES`] times. On success, returns the submitted value
    /// alongside the sequence it was finally confirmed under.
    pub async fn execute<T, S>(&self, allocator: &Arc<SequenceAllocator>, submitter: &S) -> Result<(T, u64), ExecutorError>
    where
        S: Submitter<T>,
    {
        let mut seq = allocator.allocate().await;
        let mut attempt = 1;
        loop {
            let attempt_result = with_deadline(
                self.per_attempt_timeout,
                format!("submit at sequence {seq}"),
                submitter.submit(seq),
            )
            .await;

            match attempt_result {
                Err(deadline_exceeded) => {
                    allocator.release(seq).await;
                    return Err(ExecutorError::Timeout(deadline_exceeded.to_string()));
                }
                Ok(Ok(value)) => {
                    allocator.mark_success(seq).await;
                    return Ok((value, seq));
                }
                Ok(Err(SubmitFailure::AlreadyExists(value))) => {
                    info!(sequence = seq, "submission already exists upstream; treating as success");
                    allocator.mark_success(seq).await;
                    return Ok((value, seq));
                }
                Ok(Err(SubmitFailure::SequenceMismatch { expected })) => {
                    allocator.release(seq).await;
                    if attempt >= MAX_SEQUENCE_RETRIES {
                        return Err(ExecutorError::Sequence(SequenceError::Mismatch { expected, got: seq }));
                    }
                    warn!(attempt, expected, got = seq, "sequence mismatch; reconciling and retrying");
                    // `expected` is the chain's own authoritative value for this
                    // account, so force the allocator onto it regardless of how
                    // small the apparent drift looks (max_drift = 0).
                    allocator.reconcile_with_chain(expected, 0).await;
                    tokio::time::sleep(MISMATCH_BACKOFF.delay_for_attempt(attempt)).await;
                    seq = allocator.allocate().await;
                    attempt += 1;
                }
                Ok(Err(SubmitFailure::Other(message))) => {
                    allocator.release(seq).await;
                    return Err(ExecutorError::Submission(message));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MismatchThenSuccess {
        calls: AtomicU32,
        fail_first_n: u32,
        expected: u64,
    }

    #[async_trait]
    impl Submitter<&'static str> for MismatchThenSuccess {
        async fn submit(&self, sequence: u64) -> Result<&'static str, SubmitFailure<&'static str>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                Err(SubmitFailure::SequenceMismatch { expected: self.expected })
            } else {
                assert_eq!(sequence, self.expected, "retry should use the reconciled sequence");
                Ok("dr-a")
            }
        }
    }

    #[tokio::test]
    async fn sequence_mismatch_recovers_on_next_attempt_with_fresh_sequence() {
        let allocator = SequenceAllocator::new("signer-a", 7);
        let submitter = MismatchThenSuccess {
            calls: AtomicU32::new(0),
            fail_first_n: 1,
            expected: 10,
        };
        let executor = TxExecutor::new(Duration::from_secs(1));
        let (value, seq) = executor.execute(&allocator, &submitter).await.expect("recovers");
        assert_eq!(value, "dr-a");
        assert_eq!(seq, 10, "confirmed sequence is the reconciled one, not the original");
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 2);
    }

    struct AlwaysMismatch;

    #[async_trait]
    impl Submitter<()> for AlwaysMismatch {
        async fn submit(&self, _sequence: u64) -> Result<(), SubmitFailure<()>> {
            Err(SubmitFailure::SequenceMismatch { expected: 99 })
        }
    }

    #[tokio::test]
    async fn sequence_mismatch_gives_up_after_max_retries() {
        let allocator = SequenceAllocator::new("signer-a", 0);
        let executor = TxExecutor::new(Duration::from_millis(50));
        let result = executor.execute(&allocator, &AlwaysMismatch).await;
        assert!(matches!(result, Err(ExecutorError::Sequence(SequenceError::Mismatch { .. }))));
    }

    struct AlreadyExists;

    #[async_trait]
    impl Submitter<&'static str> for AlreadyExists {
        async fn submit(&self, _sequence: u64) -> Result<&'static str, SubmitFailure<&'static str>> {
            Err(SubmitFailure::AlreadyExists("dr-existing"))
        }
    }

    #[tokio::test]
    async fn already_exists_is_treated_as_success_and_confirms_sequence() {
        let allocator = SequenceAllocator::new("signer-a", 7);
        let executor = TxExecutor::new(Duration::from_secs(1));
        let (value, seq) = executor.execute(&allocator, &AlreadyExists).await.expect("treated as success");
        assert_eq!(value, "dr-existing");
        assert_eq!(seq, 7);
        let (_next, confirmed, in_flight) = allocator.snapshot().await;
        assert_eq!(confirmed, 7);
        assert_eq!(in_flight, 0);
    }

    struct AlwaysOther;

    #[async_trait]
    impl Submitter<()> for AlwaysOther {
        async fn submit(&self, _sequence: u64) -> Result<(), SubmitFailure<()>> {
            Err(SubmitFailure::Other("rpc exploded".into()))
        }
    }

    #[tokio::test]
    async fn other_failure_releases_sequence_without_retry() {
        let allocator = SequenceAllocator::new("signer-a", 7);
        let executor = TxExecutor::new(Duration::from_secs(1));
        let result = executor.execute(&allocator, &AlwaysOther).await;
        assert!(matches!(result, Err(ExecutorError::Submission(_))));
        let (_next, confirmed, in_flight) = allocator.snapshot().await;
        assert_eq!(confirmed, 6, "release leaves confirmed untouched (seeded at 7, confirmed starts at 6)");
        assert_eq!(in_flight, 0);
    }

    struct NeverResponds;

    #[async_trait]
    impl Submitter<()> for NeverResponds {
        async fn submit(&self, _sequence: u64) -> Result<(), SubmitFailure<()>> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn timeout_releases_sequence() {
        let allocator = SequenceAllocator::new("signer-a", 7);
        let executor = TxExecutor::new(Duration::from_millis(10));
        let result = executor.execute(&allocator, &NeverResponds).await;
        assert!(matches!(result, Err(ExecutorError::Timeout(_))));
        let (_next, _confirmed, in_flight) = allocator.snapshot().await;
        assert_eq!(in_flight, 0);
    }
}
