// Path: crates/bridge-supervisor/src/event_bus.rs
//! The cross-service event bus (C12): one `tokio::sync::broadcast` channel per
//! event family. Delivery is best-effort and single-process; a subscriber that
//! falls behind drops the oldest events rather than blocking a publisher.

use seda_bridge_types::events::{PushEvent, SupervisorEvent};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// Owns the supervisor-event and push-event broadcast channels.
pub struct EventBus {
    supervisor_tx: broadcast::Sender<SupervisorEvent>,
    push_tx: broadcast::Sender<PushEvent>,
}

impl EventBus {
    /// Builds a bus with the default per-topic buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Builds a bus whose topics each buffer up to `capacity` events for slow subscribers.
    pub fn with_capacity(capacity: usize) -> Self {
        let (supervisor_tx, _) = broadcast::channel(capacity.max(1));
        let (push_tx, _) = broadcast::channel(capacity.max(1));
        Self { supervisor_tx, push_tx }
    }

    /// A sender handle for publishing supervisor-layer events.
    pub fn supervisor_sender(&self) -> broadcast::Sender<SupervisorEvent> {
        self.supervisor_tx.clone()
    }

    /// A sender handle for publishing push-layer events, handed to `PushService`.
    pub fn push_sender(&self) -> broadcast::Sender<PushEvent> {
        self.push_tx.clone()
    }

    /// Subscribes to supervisor-layer events.
    pub fn subscribe_supervisor(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.supervisor_tx.subscribe()
    }

    /// Subscribes to push-layer events.
    pub fn subscribe_push(&self) -> broadcast::Receiver<PushEvent> {
        self.push_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
