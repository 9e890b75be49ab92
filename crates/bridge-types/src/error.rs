// Path: crates/bridge-types/src/error.rs
//! Stable error categories for the bridge orchestrator.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error,
/// so metrics and logs can filter without matching on display strings.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors from the sequence allocator and validator (C2, C4).
#[derive(Error, Debug)]
pub enum SequenceError {
    /// The chain reported a sequence different from the one we submitted with.
    #[error("account sequence mismatch, expected {expected}, got {got}")]
    Mismatch {
        /// The sequence the chain expects next.
        expected: u64,
        /// The sequence we submitted with.
        got: u64,
    },
    /// Querying the chain for the account's current sequence failed.
    #[error("failed to query account sequence: {0}")]
    QueryFailed(String),
    /// No sequence could be allocated before the contention safety bound was hit.
    #[error("sequence allocation exhausted contention budget for signer {0}")]
    AllocationExhausted(String),
}

impl ErrorCode for SequenceError {
    fn code(&self) -> &'static str {
        match self {
            Self::Mismatch { .. } => "SEQUENCE_MISMATCH",
            Self::QueryFailed(_) => "SEQUENCE_QUERY_FAILED",
            Self::AllocationExhausted(_) => "SEQUENCE_ALLOCATION_EXHAUSTED",
        }
    }
}

/// Errors from posting and awaiting a single DataRequest (C3, C5).
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// The upstream chain already has this exact DataRequest; treated as success by callers.
    #[error("data request already exists")]
    AlreadyExists,
    /// The submitted sequence did not match chain state.
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    /// The operation exceeded its deadline.
    #[error("operation timed out: {0}")]
    Timeout(String),
    /// Any other, non-retryable submission failure.
    #[error("data request submission failed: {0}")]
    Submission(String),
}

impl ErrorCode for ExecutorError {
    fn code(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "EXECUTOR_ALREADY_EXISTS",
            Self::Sequence(_) => "EXECUTOR_SEQUENCE_ERROR",
            Self::Timeout(_) => "EXECUTOR_TIMEOUT",
            Self::Submission(_) => "EXECUTOR_SUBMISSION_FAILED",
        }
    }
}

/// Errors from fetching a signed batch (C7).
#[derive(Error, Debug)]
pub enum BatchFetchError {
    /// Neither the assigned batch nor a latest-signed fallback could be retrieved.
    #[error("no signed batch available for data result {0}")]
    Unavailable(String),
    /// The upstream query itself failed (network, decode, etc).
    #[error("batch query failed: {0}")]
    QueryFailed(String),
    /// The requested data result does not exist upstream.
    #[error("data result not found for dr {0}")]
    DataResultNotFound(String),
}

impl ErrorCode for BatchFetchError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "BATCH_FETCH_UNAVAILABLE",
            Self::QueryFailed(_) => "BATCH_FETCH_QUERY_FAILED",
            Self::DataResultNotFound(_) => "BATCH_FETCH_DR_NOT_FOUND",
        }
    }
}

/// Errors from pushing a batch to a destination EVM chain (C8, C9).
#[derive(Error, Debug)]
pub enum ChainPushError {
    /// A structural field on the batch was missing or malformed.
    #[error("batch validation failed: {0}")]
    InvalidBatch(String),
    /// A signature's recovered address had no matching validator entry.
    #[error("signature does not match any known validator")]
    UnmatchedSignature,
    /// Summed voting power of matched signatures fell below the 2/3 threshold.
    #[error("consensus not reached: {signed_percent:.2}% < 66.67%")]
    ConsensusNotReached {
        /// The summed voting-power percentage of validated signatures.
        signed_percent: f64,
    },
    /// The destination RPC call failed after exhausting retries.
    #[error("chain rpc call failed: {0}")]
    Rpc(String),
    /// The destination call succeeded but confirmations did not arrive in time.
    #[error("timed out waiting for confirmations")]
    ConfirmationTimeout,
}

impl ErrorCode for ChainPushError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidBatch(_) => "CHAIN_INVALID_BATCH",
            Self::UnmatchedSignature => "CHAIN_UNMATCHED_SIGNATURE",
            Self::ConsensusNotReached { .. } => "CHAIN_CONSENSUS_NOT_REACHED",
            Self::Rpc(_) => "CHAIN_RPC_FAILED",
            Self::ConfirmationTimeout => "CHAIN_CONFIRMATION_TIMEOUT",
        }
    }
}

/// Errors surfaced by supervisor lifecycle transitions (C11); the only errors
/// that bubble up to the caller rather than being logged and recorded as stats.
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// A lifecycle method was called from a state that cannot service it.
    #[error("invalid lifecycle transition: cannot {action} while {state}")]
    InvalidTransition {
        /// The action that was attempted (e.g. "start").
        action: &'static str,
        /// The current lifecycle state's display name.
        state: &'static str,
    },
    /// Initialization failed; no partial state was retained.
    #[error("initialization failed: {0}")]
    InitFailed(String),
    /// Graceful shutdown did not complete within its deadline.
    #[error("shutdown exceeded graceful timeout")]
    ShutdownTimedOut,
}

impl ErrorCode for SupervisorError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "SUPERVISOR_INVALID_TRANSITION",
            Self::InitFailed(_) => "SUPERVISOR_INIT_FAILED",
            Self::ShutdownTimedOut => "SUPERVISOR_SHUTDOWN_TIMED_OUT",
        }
    }
}
