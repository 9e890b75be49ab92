// Path: crates/bridge-evm/src/lib.rs
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

//! # SEDA Bridge EVM Surface
//!
//! The destination-chain contract as consumed by this bridge (the
//! [`EvmClient`] trait — ABI encoding and JSON-RPC wire details are out of
//! scope), plus the cryptographic core the destination prover contract
//! expects: secp256k1 signature recovery, validator merkle tree construction,
//! and the quorum/sort pipeline that feeds a batch push.

/// The `EvmClient` trait: `getLastBatchHeight`, `postBatch`, `getSedaProver`.
pub mod client;
/// A `reqwest`-backed reference implementation of `EvmClient`.
pub mod http_client;
/// Signature recovery, merkle tree construction, and the quorum/sort pipeline.
pub mod signature;

pub use client::{EvmClient, EvmError, PostBatchReceipt};
pub use http_client::HttpEvmClient;
pub use signature::{process_batch_signatures, SignatureBundle};
