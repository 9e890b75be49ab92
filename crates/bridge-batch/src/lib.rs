// Path: crates/bridge-batch/src/lib.rs
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

//! # SEDA Bridge Batch Fetcher (C7)
//!
//! Given a completed DataRequest's `(dr_id, block_height)`, fetches its assigned
//! signed batch: queries the DataResult for the batch number, polls until the
//! batch carries both signatures and validator entries, and falls back to the
//! chain's latest signed batch if the assigned one never becomes ready in time
//!.

use std::time::Duration;

use seda_bridge_types::config::BatchFetchConfig;
use seda_bridge_types::error::BatchFetchError;
use seda_bridge_types::model::Batch;
use seda_bridge_upstream::{SedaClient, SedaQueryError};
use tracing::{info, warn};

/// The result of [`BatchFetcher::fetch`], distinguishing an exact assignment
/// match from the latest-signed-batch fallback.
///
/// The fallback case is kept distinguishable rather than silently folded into
/// the same shape as an exact match: a downstream contract push built from a
/// fallback batch may reject on proof mismatch, and that failure should be
/// traceable to the fallback rather than appearing as an unexplained EVM revert.
#[derive(Debug, Clone)]
pub enum BatchFetchOutcome {
    /// The assigned batch became signed within the polling window.
    ExactMatch(Batch),
    /// The assigned batch never became signed in time; this is the chain's
    /// latest signed batch instead, which may not actually anchor the caller's
    /// DataRequest.
    FellBackToLatestSigned(Batch),
}

impl BatchFetchOutcome {
    /// Returns the underlying batch regardless of which variant this is.
    pub fn batch(&self) -> &Batch {
        match self {
            Self::ExactMatch(b) | Self::FellBackToLatestSigned(b) => b,
        }
    }

    /// Whether this outcome came from the latest-signed-batch fallback path.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::FellBackToLatestSigned(_))
    }
}

/// Fetches signed batches from the upstream chain (C7).
pub struct BatchFetcher<C: SedaClient> {
    client: C,
    config: BatchFetchConfig,
}

impl<C: SedaClient> BatchFetcher<C> {
    /// Builds a fetcher backed by `client`, polling per `config`.
    pub fn new(client: C, config: BatchFetchConfig) -> Self {
        Self { client, config }
    }

    /// Fetches the signed batch assigned to `dr_id`, polling up to
    /// `config.max_retries` times before falling back to the latest signed batch.
    pub async fn fetch(&self, dr_id: &str, block_height: u64) -> Result<BatchFetchOutcome, BatchFetchError> {
        let assignment = self
            .client
            .query_data_result(dr_id, block_height)
            .await
            .map_err(query_error_to_fetch_error)?
            .ok_or_else(|| BatchFetchError::DataResultNotFound(dr_id.to_string()))?;

        self.fetch_by_number(assignment.batch_number, dr_id).await
    }

    /// Fetches a batch already known by number (the completion tracker's
    /// discovery path surfaces `batchNumber` directly, without a dr_id to
    /// re-derive it from), applying the same poll-then-fall-back strategy as
    /// [`Self::fetch`].
    pub async fn fetch_by_number(&self, batch_number: u64, context: &str) -> Result<BatchFetchOutcome, BatchFetchError> {
        for attempt in 1..=self.config.max_retries {
            match self.client.query_batch(batch_number, false).await {
                Ok(Some(output)) if output.batch.is_signed() => {
                    info!(target = "batch", context, batch_number, attempt, "fetched signed batch");
                    return Ok(BatchFetchOutcome::ExactMatch(output.batch));
                }
                Ok(_) => {
                    info!(target = "batch", context, batch_number, attempt, "batch not yet signed; polling again");
                }
                Err(err) => {
                    warn!(target = "batch", context, batch_number, attempt, error = %err, "batch query failed; retrying");
                }
            }
            if attempt < self.config.max_retries {
                tokio::time::sleep(Duration::from_millis(self.config.polling_interval_ms)).await;
            }
        }

        warn!(target = "batch", context, batch_number, "assigned batch never signed in time; falling back to latest signed batch");
        match self.client.query_batch(batch_number, true).await {
            Ok(Some(output)) if output.batch.is_signed() => Ok(BatchFetchOutcome::FellBackToLatestSigned(output.batch)),
            Ok(_) => Err(BatchFetchError::Unavailable(context.to_string())),
            Err(err) => Err(BatchFetchError::QueryFailed(err.to_string())),
        }
    }
}

fn query_error_to_fetch_error(err: SedaQueryError) -> BatchFetchError {
    match err {
        SedaQueryError::NotFound => BatchFetchError::DataResultNotFound(String::new()),
        SedaQueryError::Rpc(msg) => BatchFetchError::QueryFailed(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use seda_bridge_types::error::SequenceError;
    use seda_bridge_types::model::{BatchSignature, ValidatorEntry};
    use seda_bridge_upstream::{
        AwaitOptions, BatchAssignment, DataResultOutcome, PostDataRequestInput, PostDataRequestOutput,
        QueryBatchOutput, SedaSubmitError,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn signed_batch(number: u64) -> Batch {
        Batch {
            batch_number: number,
            batch_id: [1u8; 32],
            block_height: 100,
            data_result_root: [0u8; 32],
            validator_root: [0u8; 32],
            signatures: vec![BatchSignature {
                validator_address: "seda1abc".into(),
                raw_signature: [0u8; 65],
                eth_address: [0u8; 20],
                voting_power_percentage: 100.0,
                merkle_proof: vec![],
            }],
            validator_entries: vec![ValidatorEntry {
                validator_address: "seda1abc".into(),
                eth_address: [0u8; 20],
                voting_power_percentage: 100.0,
            }],
            data_request_ids: vec!["dr-a".to_string()],
        }
    }

    fn unsigned_batch(number: u64) -> Batch {
        Batch {
            signatures: vec![],
            validator_entries: vec![],
            ..signed_batch(number)
        }
    }

    struct FakeClient {
        attempts_until_signed: AtomicU32,
        latest_signed: Mutex<Option<Batch>>,
    }

    #[async_trait]
    impl SedaClient for FakeClient {
        async fn post_data_request(&self, _: PostDataRequestInput, _: u64) -> Result<PostDataRequestOutput, SedaSubmitError> {
            unreachable!()
        }
        async fn await_data_result(&self, _: &str, _: u64, _: AwaitOptions) -> Result<DataResultOutcome, seda_bridge_upstream::SedaQueryError> {
            unreachable!()
        }
        async fn query_account_sequence(&self, _: &str) -> Result<u64, SequenceError> {
            unreachable!()
        }
        async fn query_data_result(&self, _: &str, _: u64) -> Result<Option<BatchAssignment>, seda_bridge_upstream::SedaQueryError> {
            Ok(Some(BatchAssignment { batch_number: 42 }))
        }
        async fn query_batch(&self, batch_number: u64, latest_signed: bool) -> Result<Option<QueryBatchOutput>, seda_bridge_upstream::SedaQueryError> {
            if latest_signed {
                return Ok(self.latest_signed.lock().unwrap_or_else(|e| e.into_inner()).clone().map(|batch| QueryBatchOutput { batch }));
            }
            let remaining = self.attempts_until_signed.fetch_sub(1, Ordering::SeqCst);
            if remaining <= 1 {
                Ok(Some(QueryBatchOutput { batch: signed_batch(batch_number) }))
            } else {
                Ok(Some(QueryBatchOutput { batch: unsigned_batch(batch_number) }))
            }
        }
    }

    #[tokio::test]
    async fn fetch_returns_exact_match_once_batch_becomes_signed() {
        let client = FakeClient { attempts_until_signed: AtomicU32::new(2), latest_signed: Mutex::new(None) };
        let mut config = BatchFetchConfig::default();
        config.polling_interval_ms = 1;
        let fetcher = BatchFetcher::new(client, config);
        let outcome = fetcher.fetch("dr-a", 100).await.unwrap();
        assert!(!outcome.is_fallback());
        assert_eq!(outcome.batch().batch_number, 42);
    }

    #[tokio::test]
    async fn fetch_falls_back_to_latest_signed_when_assigned_never_signs() {
        let client = FakeClient {
            attempts_until_signed: AtomicU32::new(1_000_000),
            latest_signed: Mutex::new(Some(signed_batch(99))),
        };
        let mut config = BatchFetchConfig::default();
        config.max_retries = 2;
        config.polling_interval_ms = 1;
        let fetcher = BatchFetcher::new(client, config);
        let outcome = fetcher.fetch("dr-a", 100).await.unwrap();
        assert!(outcome.is_fallback());
        assert_eq!(outcome.batch().batch_number, 99);
    }

    #[tokio::test]
    async fn fetch_errors_when_neither_assigned_nor_fallback_is_available() {
        let client = FakeClient { attempts_until_signed: AtomicU32::new(1_000_000), latest_signed: Mutex::new(None) };
        let mut config = BatchFetchConfig::default();
        config.max_retries = 1;
        config.polling_interval_ms = 1;
        let fetcher = BatchFetcher::new(client, config);
        let result = fetcher.fetch("dr-a", 100).await;
        assert!(matches!(result, Err(BatchFetchError::Unavailable(_))));
    }
}
