// Path: crates/bridge-supervisor/src/lib.rs
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

//! # SEDA Bridge Supervisor
//!
//! [`Supervisor`] (C11) drives every managed sub-service through the
//! `Uninitialized → Initialized → Running ⇄ Stopped → ShutDown` lifecycle and
//! aggregates their health on a periodic loop. [`EventBus`] (C12) is the
//! cross-service broadcast transport for [`seda_bridge_types::events::SupervisorEvent`]
//! and [`seda_bridge_types::events::PushEvent`].

/// Cross-service event broadcast channels (C12).
pub mod event_bus;
/// The lifecycle state machine's states and valid transitions.
pub mod lifecycle;
/// The supervisor itself: component registry, lifecycle driver, health loop (C11).
pub mod supervisor;

pub use event_bus::EventBus;
pub use lifecycle::LifecycleState;
pub use supervisor::{ManagedComponent, Supervisor};
