// Path: crates/bridge-types/src/model.rs
//! Core data model shared across the orchestrator.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a single `DataRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataRequestState {
    /// A sequence has been allocated but the request has not yet been posted.
    Allocated,
    /// The request was posted to the upstream chain and awaits a result.
    Posted,
    /// The upstream chain produced a result for this request.
    Completed,
    /// The request's containing batch number is known.
    BatchAssigned,
    /// The request could not progress and tracking was abandoned.
    Failed,
}

/// A single oracle-style unit of work posted to the upstream chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRequest {
    /// Opaque hex identifier assigned by the upstream chain after posting.
    pub dr_id: String,
    /// Block height at which the request was included.
    pub block_height: u64,
    /// Bounded, human-readable memo attached at submission (≤256 bytes).
    pub memo: String,
    /// The sequence number the submitting transaction was bound to.
    pub sequence_number: u64,
    /// Wall-clock time the request was posted, in milliseconds since the epoch.
    pub posted_at_ms: u64,
    /// Current lifecycle state.
    pub state: DataRequestState,
    /// Batch number this request was ultimately assigned to, once known.
    pub batch_number: Option<u64>,
}

/// A validator's signature over a batch, as consumed by the destination prover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSignature {
    /// The upstream validator's native address.
    pub validator_address: String,
    /// 65-byte secp256k1 signature: `r(32) ‖ s(32) ‖ v(1)`.
    pub raw_signature: [u8; 65],
    /// 20-byte Ethereum address recovered from the signature.
    pub eth_address: [u8; 20],
    /// This validator's share of total voting power, 0..100.
    pub voting_power_percentage: f64,
    /// Merkle proof for this validator's leaf in the validator tree.
    pub merkle_proof: Vec<[u8; 32]>,
}

/// A validator set member, as published alongside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorEntry {
    /// The upstream validator's native address.
    pub validator_address: String,
    /// The validator's Ethereum address for signature recovery matching.
    pub eth_address: [u8; 20],
    /// This validator's share of total voting power, 0..100.
    pub voting_power_percentage: f64,
}

/// A unit of cross-chain anchoring: a signed batch of upstream DataResults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Monotonically increasing batch number, ≥ 1.
    pub batch_number: u64,
    /// 32-byte digest identifying this batch.
    pub batch_id: [u8; 32],
    /// Upstream block height at which the batch was formed.
    pub block_height: u64,
    /// Merkle root over the batch's DataResults.
    pub data_result_root: [u8; 32],
    /// Merkle root over the signing validator set.
    pub validator_root: [u8; 32],
    /// Signatures collected from the upstream validator set.
    pub signatures: Vec<BatchSignature>,
    /// The full validator set that was eligible to sign this batch.
    pub validator_entries: Vec<ValidatorEntry>,
    /// The ordered set of DataRequest ids anchored in this batch.
    pub data_request_ids: Vec<String>,
}

impl Batch {
    /// A batch is signed iff it carries at least one signature and one validator entry.
    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty() && !self.validator_entries.is_empty()
    }
}

/// Per-destination-chain status of one batch's anchoring attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainBatchPhase {
    /// Not yet attempted.
    Pending,
    /// A push attempt is in flight.
    Pushing,
    /// The batch was anchored successfully.
    Pushed,
    /// The push attempt failed.
    Failed,
}

/// Tracked status of a batch push against a single destination chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainBatchStatus {
    /// Current phase of the push attempt.
    pub phase: ChainBatchPhase,
    /// Transaction hash, once submitted.
    pub tx_hash: Option<String>,
    /// Block number the transaction landed in, once known.
    pub block_number: Option<u64>,
    /// Confirmations observed so far.
    pub confirmations: u32,
    /// Number of retry attempts made so far.
    pub retry_count: u32,
    /// Wall-clock time of the last attempt, in milliseconds since the epoch.
    pub last_attempt_at_ms: Option<u64>,
    /// Wall-clock time the next retry is eligible, in milliseconds since the epoch.
    pub next_retry_at_ms: Option<u64>,
    /// The most recent error message, if the last attempt failed.
    pub last_error: Option<String>,
}

impl Default for ChainBatchStatus {
    fn default() -> Self {
        Self {
            phase: ChainBatchPhase::Pending,
            tx_hash: None,
            block_number: None,
            confirmations: 0,
            retry_count: 0,
            last_attempt_at_ms: None,
            next_retry_at_ms: None,
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_is_signed_requires_both_arrays_nonempty() {
        let mut batch = Batch {
            batch_number: 1,
            batch_id: [0u8; 32],
            block_height: 100,
            data_result_root: [0u8; 32],
            validator_root: [0u8; 32],
            signatures: vec![],
            validator_entries: vec![],
            data_request_ids: vec![],
        };
        assert!(!batch.is_signed());

        batch.signatures.push(BatchSignature {
            validator_address: "seda1abc".into(),
            raw_signature: [0u8; 65],
            eth_address: [0u8; 20],
            voting_power_percentage: 100.0,
            merkle_proof: vec![],
        });
        assert!(!batch.is_signed());

        batch.validator_entries.push(ValidatorEntry {
            validator_address: "seda1abc".into(),
            eth_address: [0u8; 20],
            voting_power_percentage: 100.0,
        });
        assert!(batch.is_signed());
    }
}
