// Path: crates/bridge-upstream/src/lib.rs
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

//! # SEDA Bridge Upstream Client
//!
//! Defines the [`SedaClient`] trait the scheduler, tracker, and fetcher drive, and
//! ships one concrete [`HttpSedaClient`] so the workspace is runnable end-to-end
//! without inventing a full SEDA protocol stack — the wire encoding of SEDA's
//! actual RPC surface is out of scope; this client only needs to
//! satisfy the trait's contract.

/// The HTTP reference implementation of [`SedaClient`].
pub mod http_client;

use async_trait::async_trait;
use seda_bridge_types::error::SequenceError;
use seda_bridge_types::Batch;
use thiserror::Error;

pub use http_client::HttpSedaClient;

/// Input to [`SedaClient::post_data_request`].
#[derive(Debug, Clone)]
pub struct PostDataRequestInput {
    /// The memo string to attach, already suffixed with the allocated sequence.
    pub memo: String,
}

/// Result of a successful DataRequest submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDataRequestOutput {
    /// The opaque hex identifier the chain assigned to this request.
    pub dr_id: String,
    /// The block height the submission was included at.
    pub block_height: u64,
    /// The submitting transaction's hash.
    pub tx_hash: String,
}

/// Classified failure of [`SedaClient::post_data_request`].
#[derive(Debug, Error)]
pub enum SedaSubmitError {
    /// The chain already has this exact content; carries the existing submission's
    /// output so callers can treat it as success without re-deriving it.
    #[error("data request already exists")]
    AlreadyExists(PostDataRequestOutput),
    /// The submitted sequence did not match the account's current sequence.
    #[error("account sequence mismatch, expected {expected}")]
    SequenceMismatch {
        /// The sequence the chain expects next.
        expected: u64,
    },
    /// Any other submission failure (network, node rejection, etc).
    #[error("data request submission failed: {0}")]
    Rpc(String),
}

/// Timing knobs for [`SedaClient::await_data_result`].
#[derive(Debug, Clone, Copy)]
pub struct AwaitOptions {
    /// Total time to wait for a result before giving up, in seconds.
    pub timeout_secs: u64,
    /// Delay between result polls, in seconds.
    pub poll_interval_secs: u64,
}

/// The outcome of a completed DataRequest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataResultOutcome {
    /// The DataRequest identifier this result belongs to.
    pub dr_id: String,
    /// The oracle program's reported exit code.
    pub exit_code: u32,
    /// The raw result bytes.
    pub result: Vec<u8>,
    /// The block height the result was finalized at.
    pub block_height: u64,
    /// Gas consumed producing the result.
    pub gas_used: u64,
    /// Whether the executors reached consensus on this result.
    pub consensus: bool,
}

/// Errors from read-only upstream queries.
#[derive(Debug, Error)]
pub enum SedaQueryError {
    /// The queried resource does not exist (yet, or at all).
    #[error("not found")]
    NotFound,
    /// The query itself failed (network, decode, node error).
    #[error("query failed: {0}")]
    Rpc(String),
}

/// The batch number a completed DataRequest was ultimately anchored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchAssignment {
    /// The assigned batch number.
    pub batch_number: u64,
}

/// The full response to [`SedaClient::query_batch`]: a batch plus its raw
/// DataResult-entry identifiers, which populate [`Batch::data_request_ids`].
#[derive(Debug, Clone)]
pub struct QueryBatchOutput {
    /// The fetched batch, including signatures and the validator set.
    pub batch: Batch,
}

/// The upstream SEDA chain contract this bridge consumes.
///
/// Posting, ABI/wire encoding, and the actual SEDA RPC protocol are out of scope
///; this trait only specifies the operations and their outcomes.
#[async_trait]
pub trait SedaClient: Send + Sync {
    /// Submits a DataRequest bound to `sequence`.
    async fn post_data_request(
        &self,
        input: PostDataRequestInput,
        sequence: u64,
    ) -> Result<PostDataRequestOutput, SedaSubmitError>;

    /// Awaits a DataRequest's result, polling at `opts.poll_interval_secs` up to
    /// `opts.timeout_secs`.
    async fn await_data_result(
        &self,
        dr_id: &str,
        block_height: u64,
        opts: AwaitOptions,
    ) -> Result<DataResultOutcome, SedaQueryError>;

    /// Returns the chain's current sequence for `address`. Also satisfies
    /// `seda-bridge-sequence::SequenceSource` for callers that need only this method.
    async fn query_account_sequence(&self, address: &str) -> Result<u64, SequenceError>;

    /// Returns the batch a completed DataRequest was assigned to, if known.
    async fn query_data_result(&self, dr_id: &str, block_height: u64) -> Result<Option<BatchAssignment>, SedaQueryError>;

    /// Fetches a batch by number, or the latest signed batch if `latest_signed` is set.
    async fn query_batch(&self, batch_number: u64, latest_signed: bool) -> Result<Option<QueryBatchOutput>, SedaQueryError>;
}

#[async_trait]
impl<T: SedaClient + ?Sized> SedaClient for std::sync::Arc<T> {
    async fn post_data_request(
        &self,
        input: PostDataRequestInput,
        sequence: u64,
    ) -> Result<PostDataRequestOutput, SedaSubmitError> {
        (**self).post_data_request(input, sequence).await
    }

    async fn await_data_result(
        &self,
        dr_id: &str,
        block_height: u64,
        opts: AwaitOptions,
    ) -> Result<DataResultOutcome, SedaQueryError> {
        (**self).await_data_result(dr_id, block_height, opts).await
    }

    async fn query_account_sequence(&self, address: &str) -> Result<u64, SequenceError> {
        (**self).query_account_sequence(address).await
    }

    async fn query_data_result(&self, dr_id: &str, block_height: u64) -> Result<Option<BatchAssignment>, SedaQueryError> {
        (**self).query_data_result(dr_id, block_height).await
    }

    async fn query_batch(&self, batch_number: u64, latest_signed: bool) -> Result<Option<QueryBatchOutput>, SedaQueryError> {
        (**self).query_batch(batch_number, latest_signed).await
    }
}
