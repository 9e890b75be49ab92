// Path: crates/bridge-evm/src/client.rs
//! The downstream EVM chain contract this bridge consumes.
//!
//! ABI encoding and the JSON-RPC transport are out of scope; this
//! trait only specifies the operations the chain executor (C8) drives.

use async_trait::async_trait;
use thiserror::Error;

use crate::signature::SignatureBundle;

/// Errors from a single downstream-chain RPC call.
#[derive(Debug, Error, Clone)]
pub enum EvmError {
    /// The RPC call itself failed (network, node rejection).
    #[error("evm rpc call failed: {0}")]
    Rpc(String),
    /// The call succeeded but returned a value this client couldn't interpret.
    #[error("evm response decode failed: {0}")]
    Decode(String),
}

/// The on-chain data a `postBatch` call needs, mirroring the destination
/// prover contract's expected struct.
#[derive(Debug, Clone)]
pub struct BatchCalldata {
    /// The batch number being anchored.
    pub batch_number: u64,
    /// The batch's 32-byte digest.
    pub batch_id: [u8; 32],
    /// Merkle root over the batch's DataResults.
    pub data_result_root: [u8; 32],
    /// Merkle root over the validator set that signed this batch.
    pub validator_root: [u8; 32],
}

/// The result of a successful `postBatch` submission.
#[derive(Debug, Clone)]
pub struct PostBatchReceipt {
    /// The destination transaction hash.
    pub tx_hash: String,
    /// The block number the transaction landed in.
    pub block_number: u64,
    /// Gas actually consumed.
    pub gas_used: u64,
}

/// The destination-chain surface the chain executor (C8) drives: one
/// `EvmClient` per configured destination chain.
#[async_trait]
pub trait EvmClient: Send + Sync {
    /// Discovers the prover contract address via the SEDA core contract's
    /// `getSedaProver()`.
    async fn get_seda_prover(&self) -> Result<String, EvmError>;

    /// Returns the prover's `getLastBatchHeight()`.
    async fn get_last_batch_height(&self) -> Result<u64, EvmError>;

    /// Returns whether `batch_number` has already been anchored on this chain.
    async fn is_batch_pushed(&self, batch_number: u64) -> Result<bool, EvmError>;

    /// Estimates gas for a `postBatch` call with the given calldata shape.
    async fn estimate_gas(&self, batch: &BatchCalldata, signatures: &[SignatureBundle]) -> Result<u64, EvmError>;

    /// Submits `postBatch(batch, signatures[], validatorProofs[])` and awaits
    /// the configured number of confirmations.
    async fn post_batch(
        &self,
        batch: &BatchCalldata,
        signatures: &[SignatureBundle],
        gas_limit: u64,
    ) -> Result<PostBatchReceipt, EvmError>;

    /// A liveness probe against the chain RPC.
    async fn check_health(&self) -> bool;
}
