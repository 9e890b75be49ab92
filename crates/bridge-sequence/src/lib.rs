// Path: crates/bridge-sequence/src/lib.rs
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

//! # SEDA Bridge Sequence Management
//!
//! The sequence allocator (C2) and sequence validator (C4): strict per-signer
//! transaction-sequence ordering on a Cosmos-style upstream chain, plus
//! periodic reconciliation against observed chain state.

/// Sequence Allocator (C2).
pub mod allocator;
/// Sequence Validator (C4).
pub mod validator;

pub use allocator::{ReconcileOutcome, SequenceAllocator};
pub use validator::{SequenceSource, SequenceValidator, DEFAULT_MAX_DRIFT, DEFAULT_VALIDATION_INTERVAL};
