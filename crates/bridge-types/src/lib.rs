// Path: crates/bridge-types/src/lib.rs
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

//! # SEDA Bridge Types
//!
//! Shared data model (`DataRequest`, `Batch`, `ChainBatchStatus`, ...), error codes,
//! event topics, and configuration structs used across every bridge orchestrator
//! crate. Nothing here talks to the network; it is the common vocabulary other
//! crates build on.

/// Configuration structs for every component, matching the knobs an external
/// loader would populate (config parsing itself is out of scope).
pub mod config;
/// Stable, categorized error types shared across crate boundaries.
pub mod error;
/// Supervisor-layer and push-layer event definitions (C12).
pub mod events;
/// Core data model: `DataRequest`, `Batch`, `BatchSignature`, `ChainBatchStatus`.
pub mod model;

pub use error::ErrorCode;
pub use events::{PushEvent, SupervisorEvent};
pub use model::{
    Batch, BatchSignature, ChainBatchStatus, DataRequest, DataRequestState, ValidatorEntry,
};
