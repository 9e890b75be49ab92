// Path: crates/bridge-sequence/src/allocator.rs
//! Sequence Allocator (C2): atomic allocation/release/reconciliation of a
//! per-signer monotonic transaction sequence number.

use std::collections::BTreeSet;
use std::sync::Arc;

use seda_bridge_telemetry::sequence_metrics;
use tokio::sync::Mutex;
use tracing::{info, warn};

struct SequenceState {
    next_sequence: u64,
    confirmed_sequence: u64,
    allocated: BTreeSet<u64>,
}

/// Owns `nextSequence`, `confirmedSequence`, and the `allocated` set for one
/// signer, serialized behind a single lock.
///
/// The chain rejects transactions whose sequence doesn't match the account's
/// current sequence, so allocation for a signer must be fully serialized; a
/// `tokio::sync::Mutex` gives FIFO queuing under contention for free — waiters
/// simply wait their turn rather than spin.
pub struct SequenceAllocator {
    signer: String,
    state: Mutex<SequenceState>,
}

/// Result of [`SequenceAllocator::reconcile_with_chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Drift was within `max_drift`, or the local counter was already ahead;
    /// only `confirmed` may have been nudged upward.
    MinorOrNone,
    /// Local counter was behind chain truth beyond `max_drift`; counters were
    /// force-synced and all in-flight allocations were dropped.
    MajorResync,
}

impl SequenceAllocator {
    /// Creates an allocator seeded at `seed` for `signer`.
    pub fn new(signer: impl Into<String>, seed: u64) -> Arc<Self> {
        let signer = signer.into();
        sequence_metrics().set_next_sequence(&signer, seed);
        sequence_metrics().set_confirmed_sequence(&signer, seed.saturating_sub(1));
        Arc::new(Self {
            signer,
            state: Mutex::new(SequenceState {
                next_sequence: seed,
                confirmed_sequence: seed.saturating_sub(1),
                allocated: BTreeSet::new(),
            }),
        })
    }

    /// Allocates and returns the next free sequence, advancing past any
    /// still-allocated holes.
    pub async fn allocate(&self) -> u64 {
        let mut state = self.state.lock().await;
        let mut candidate = state.next_sequence;
        while state.allocated.contains(&candidate) {
            candidate += 1;
        }
        state.allocated.insert(candidate);
        state.next_sequence = candidate + 1;
        sequence_metrics().set_next_sequence(&self.signer, state.next_sequence);
        sequence_metrics().set_in_flight(&self.signer, state.allocated.len() as u64);
        candidate
    }

    /// Marks `seq` confirmed: removes it from the in-flight set and advances
    /// the confirmed/next counters.
    pub async fn mark_success(&self, seq: u64) {
        let mut state = self.state.lock().await;
        state.allocated.remove(&seq);
        state.confirmed_sequence = state.confirmed_sequence.max(seq);
        state.next_sequence = state.next_sequence.max(state.confirmed_sequence + 1);
        sequence_metrics().set_confirmed_sequence(&self.signer, state.confirmed_sequence);
        sequence_metrics().set_next_sequence(&self.signer, state.next_sequence);
        sequence_metrics().set_in_flight(&self.signer, state.allocated.len() as u64);
    }

    /// Releases `seq` with no effect on the counters; used on non-recoverable
    /// failures so the sequence is dropped rather than reused.
    pub async fn release(&self, seq: u64) {
        let mut state = self.state.lock().await;
        state.allocated.remove(&seq);
        sequence_metrics().set_in_flight(&self.signer, state.allocated.len() as u64);
    }

    /// Reconciles the local counters against a freshly observed chain
    /// sequence.
    pub async fn reconcile_with_chain(&self, chain_seq: u64, max_drift: u64) -> ReconcileOutcome {
        let mut state = self.state.lock().await;
        let drift = chain_seq.abs_diff(state.next_sequence);

        if drift > max_drift && state.next_sequence < chain_seq {
            warn!(
                signer = %self.signer,
                local_next = state.next_sequence,
                chain_seq,
                "sequence drift beyond threshold; forcing resync and dropping in-flight allocations"
            );
            state.confirmed_sequence = chain_seq;
            state.next_sequence = chain_seq;
            state.allocated.clear();
            sequence_metrics().inc_major_resync(&self.signer);
            sequence_metrics().set_confirmed_sequence(&self.signer, state.confirmed_sequence);
            sequence_metrics().set_next_sequence(&self.signer, state.next_sequence);
            sequence_metrics().set_in_flight(&self.signer, 0);
            ReconcileOutcome::MajorResync
        } else {
            if chain_seq > state.confirmed_sequence {
                info!(signer = %self.signer, chain_seq, "nudging confirmed sequence upward");
                state.confirmed_sequence = chain_seq;
                sequence_metrics().set_confirmed_sequence(&self.signer, state.confirmed_sequence);
            }
            ReconcileOutcome::MinorOrNone
        }
    }

    /// Returns `(next_sequence, confirmed_sequence, in_flight_count)` for tests
    /// and status reporting.
    pub async fn snapshot(&self) -> (u64, u64, usize) {
        let state = self.state.lock().await;
        (state.next_sequence, state.confirmed_sequence, state.allocated.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allocate_never_reuses_an_in_flight_sequence() {
        let allocator = SequenceAllocator::new("signer-a", 7);
        let a = allocator.allocate().await;
        let b = allocator.allocate().await;
        assert_eq!(a, 7);
        assert_eq!(b, 8);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn mark_success_advances_confirmed_and_next() {
        let allocator = SequenceAllocator::new("signer-a", 7);
        let seq = allocator.allocate().await;
        allocator.mark_success(seq).await;
        let (next, confirmed, in_flight) = allocator.snapshot().await;
        assert_eq!(confirmed, 7);
        assert_eq!(next, 8);
        assert_eq!(in_flight, 0);
    }

    #[tokio::test]
    async fn release_drops_sequence_without_advancing_counters() {
        let allocator = SequenceAllocator::new("signer-a", 7);
        let seq = allocator.allocate().await;
        allocator.release(seq).await;
        let (next, confirmed, in_flight) = allocator.snapshot().await;
        assert_eq!(confirmed, 6);
        assert_eq!(next, 8);
        assert_eq!(in_flight, 0);
    }

    #[tokio::test]
    async fn reconcile_forces_major_resync_when_local_behind_beyond_drift() {
        let allocator = SequenceAllocator::new("signer-a", 7);
        allocator.allocate().await;
        let outcome = allocator.reconcile_with_chain(10, 1).await;
        assert_eq!(outcome, ReconcileOutcome::MajorResync);
        let (next, confirmed, in_flight) = allocator.snapshot().await;
        assert_eq!(next, 10);
        assert_eq!(confirmed, 10);
        assert_eq!(in_flight, 0);
    }

    #[tokio::test]
    async fn reconcile_is_minor_when_local_ahead_of_chain() {
        let allocator = SequenceAllocator::new("signer-a", 7);
        let outcome = allocator.reconcile_with_chain(3, 1).await;
        assert_eq!(outcome, ReconcileOutcome::MinorOrNone);
        let (next, _confirmed, _in_flight) = allocator.snapshot().await;
        assert_eq!(next, 7);
    }

    #[tokio::test]
    async fn reconcile_nudges_confirmed_on_small_drift() {
        let allocator = SequenceAllocator::new("signer-a", 7);
        let outcome = allocator.reconcile_with_chain(8, 5).await;
        assert_eq!(outcome, ReconcileOutcome::MinorOrNone);
        let (next, confirmed, _in_flight) = allocator.snapshot().await;
        assert_eq!(confirmed, 8);
        assert_eq!(next, 7, "next is untouched on minor drift");
    }
}
