// Path: crates/bridge-tracker/src/lib.rs
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

//! # SEDA Bridge Completion Tracker (C6)
//!
//! For each posted DataRequest, polls the upstream chain until its result is
//! known, then (if batch tracking is enabled) until its batch assignment is
//! known. DataRequests move `pending → completed → batch_assigned` (terminal)
//! or `pending → failed` once `max_retry_attempts` is exhausted.
//!
//! Batch numbers whose assignment was just discovered are queued for pickup by
//! [`CompletionTracker::take_newly_ready_batches`], which the push service (C10)
//! polls as its discovery step.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use seda_bridge_scheduler::CompletionRegistrar;
use seda_bridge_telemetry::tracker_metrics;
use seda_bridge_types::config::TrackerConfig;
use seda_bridge_types::model::{Batch, DataRequest, DataRequestState};
use seda_bridge_upstream::{AwaitOptions, SedaClient, SedaQueryError};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// A fallback source of recently-formed batches, searched by DataRequest id when
/// the upstream chain hasn't yet surfaced a direct batch-assignment answer
///.
#[async_trait]
pub trait BatchWindowSource: Send + Sync {
    /// Returns up to `window` of the most recently formed batches, newest first.
    async fn recent_batches(&self, window: u32) -> Vec<Batch>;
}

struct TrackedEntry {
    dr: DataRequest,
    retry_count: u32,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Polls the upstream chain for completion and batch assignment of tracked
/// DataRequests (C6).
pub struct CompletionTracker<C: SedaClient, B: BatchWindowSource> {
    client: Arc<C>,
    batch_source: Arc<B>,
    config: TrackerConfig,
    tracked: Mutex<HashMap<String, TrackedEntry>>,
    batch_ready: Mutex<BTreeSet<u64>>,
}

impl<C, B> CompletionTracker<C, B>
where
    C: SedaClient + 'static,
    B: BatchWindowSource + 'static,
{
    /// Builds a tracker backed by `client` for result queries and `batch_source`
    /// for the sliding-window batch-assignment fallback.
    pub fn new(client: Arc<C>, batch_source: Arc<B>, config: TrackerConfig) -> Arc<Self> {
        Arc::new(Self {
            client,
            batch_source,
            config,
            tracked: Mutex::new(HashMap::new()),
            batch_ready: Mutex::new(BTreeSet::new()),
        })
    }

    /// Runs the polling loop until `shutdown` resolves true.
    pub async fn run(self: &Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Drains and returns batch numbers whose assignment was discovered since
    /// the last call (the push service's discovery step, C10).
    pub async fn take_newly_ready_batches(&self) -> Vec<u64> {
        let mut ready = self.batch_ready.lock().await;
        let drained: Vec<u64> = ready.iter().copied().collect();
        ready.clear();
        drained
    }

    /// Number of DataRequests currently being tracked.
    pub async fn tracked_count(&self) -> usize {
        self.tracked.lock().await.len()
    }

    /// One polling pass over every tracked DataRequest.
    pub async fn poll_once(self: &Arc<Self>) {
        let snapshot: Vec<(String, DataRequestState, u64, u32)> = {
            let tracked = self.tracked.lock().await;
            tracked
                .iter()
                .map(|(id, e)| (id.clone(), e.dr.state, e.dr.block_height, e.retry_count))
                .collect()
        };
        tracker_metrics().set_tracked(snapshot.len() as u64);

        for (dr_id, state, block_height, _retry_count) in snapshot {
            match state {
                DataRequestState::Posted => self.poll_pending(&dr_id, block_height).await,
                DataRequestState::Completed => self.poll_batch_assignment(&dr_id).await,
                _ => {}
            }
        }
    }

    async fn poll_pending(self: &Arc<Self>, dr_id: &str, block_height: u64) {
        // A zero-timeout await is a single-attempt probe: "is it completed yet?"
        let probe = AwaitOptions { timeout_secs: 0, poll_interval_secs: 1 };
        match self.client.await_data_result(dr_id, block_height, probe).await {
            Ok(outcome) => {
                info!(target = "tracker", dr_id, exit_code = outcome.exit_code, "data request completed");
                tracker_metrics().inc_completed();
                let mut tracked = self.tracked.lock().await;
                if let Some(entry) = tracked.get_mut(dr_id) {
                    let posted_at = entry.dr.posted_at_ms;
                    entry.dr.state = DataRequestState::Completed;
                    tracker_metrics().observe_completion_latency(now_ms().saturating_sub(posted_at) as f64 / 1000.0);
                }
                drop(tracked);
                if self.config.batch_tracking_enabled {
                    self.poll_batch_assignment(dr_id).await;
                }
            }
            Err(SedaQueryError::NotFound) => self.record_attempt_failure(dr_id).await,
            Err(SedaQueryError::Rpc(err)) => {
                warn!(target = "tracker", dr_id, error = %err, "result query failed; will retry");
                self.record_attempt_failure(dr_id).await;
            }
        }
    }

    async fn poll_batch_assignment(self: &Arc<Self>, dr_id: &str) {
        let block_height = {
            let tracked = self.tracked.lock().await;
            match tracked.get(dr_id) {
                Some(entry) => entry.dr.block_height,
                None => return,
            }
        };

        let direct = self.client.query_data_result(dr_id, block_height).await;
        let batch_number = match direct {
            Ok(Some(assignment)) => Some(assignment.batch_number),
            Ok(None) | Err(_) => {
                let batches = self.batch_source.recent_batches(self.config.batch_window).await;
                batches
                    .iter()
                    .find(|b| b.data_request_ids.iter().any(|id| id == dr_id))
                    .map(|b| b.batch_number)
            }
        };

        let Some(batch_number) = batch_number else {
            return;
        };

        info!(target = "tracker", dr_id, batch_number, "batch assignment discovered");
        tracker_metrics().inc_batch_assigned();
        {
            let mut tracked = self.tracked.lock().await;
            tracked.remove(dr_id);
        }
        self.batch_ready.lock().await.insert(batch_number);
    }

    async fn record_attempt_failure(self: &Arc<Self>, dr_id: &str) {
        let abandon = {
            let mut tracked = self.tracked.lock().await;
            match tracked.get_mut(dr_id) {
                Some(entry) => {
                    entry.retry_count += 1;
                    entry.retry_count >= self.config.max_retry_attempts
                }
                None => false,
            }
        };
        if abandon {
            warn!(target = "tracker", dr_id, "abandoning data request after exhausting retries");
            tracker_metrics().inc_abandoned();
            self.tracked.lock().await.remove(dr_id);
        }
    }
}

#[async_trait]
impl<C, B> CompletionRegistrar for CompletionTracker<C, B>
where
    C: SedaClient + 'static,
    B: BatchWindowSource + 'static,
{
    async fn register(&self, dr: DataRequest) {
        let mut tracked = self.tracked.lock().await;
        tracked.insert(dr.dr_id.clone(), TrackedEntry { dr, retry_count: 0 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seda_bridge_types::error::SequenceError;
    use seda_bridge_upstream::{BatchAssignment, DataResultOutcome, PostDataRequestInput, PostDataRequestOutput, QueryBatchOutput, SedaSubmitError};
    use tokio::sync::Mutex as TokioMutex;

    struct FakeClient {
        completed: TokioMutex<BTreeSet<String>>,
        assignment: TokioMutex<HashMap<String, u64>>,
    }

    #[async_trait]
    impl SedaClient for FakeClient {
        async fn post_data_request(&self, _: PostDataRequestInput, _: u64) -> Result<PostDataRequestOutput, SedaSubmitError> {
            unreachable!("tracker never posts")
        }
        async fn await_data_result(&self, dr_id: &str, _: u64, _: AwaitOptions) -> Result<DataResultOutcome, SedaQueryError> {
            if self.completed.lock().await.contains(dr_id) {
                Ok(DataResultOutcome {
                    dr_id: dr_id.to_string(),
                    exit_code: 0,
                    result: vec![],
                    block_height: 100,
                    gas_used: 10,
                    consensus: true,
                })
            } else {
                Err(SedaQueryError::NotFound)
            }
        }
        async fn query_account_sequence(&self, _: &str) -> Result<u64, SequenceError> {
            Ok(0)
        }
        async fn query_data_result(&self, dr_id: &str, _: u64) -> Result<Option<BatchAssignment>, SedaQueryError> {
            Ok(self.assignment.lock().await.get(dr_id).map(|n| BatchAssignment { batch_number: *n }))
        }
        async fn query_batch(&self, _: u64, _: bool) -> Result<Option<QueryBatchOutput>, SedaQueryError> {
            Ok(None)
        }
    }

    struct EmptyWindow;
    #[async_trait]
    impl BatchWindowSource for EmptyWindow {
        async fn recent_batches(&self, _window: u32) -> Vec<Batch> {
            vec![]
        }
    }

    fn test_dr(id: &str) -> DataRequest {
        DataRequest {
            dr_id: id.to_string(),
            block_height: 100,
            memo: "m".into(),
            sequence_number: 1,
            posted_at_ms: now_ms(),
            state: DataRequestState::Posted,
            batch_number: None,
        }
    }

    #[tokio::test]
    async fn completed_dr_with_direct_assignment_becomes_batch_ready() {
        let client = Arc::new(FakeClient {
            completed: TokioMutex::new(BTreeSet::from(["dr-a".to_string()])),
            assignment: TokioMutex::new(HashMap::from([("dr-a".to_string(), 42u64)])),
        });
        let tracker = CompletionTracker::new(client, Arc::new(EmptyWindow), TrackerConfig::default());
        tracker.register(test_dr("dr-a")).await;
        tracker.poll_once().await;
        assert_eq!(tracker.tracked_count().await, 0);
        assert_eq!(tracker.take_newly_ready_batches().await, vec![42]);
    }

    #[tokio::test]
    async fn pending_dr_is_abandoned_after_max_retries() {
        let client = Arc::new(FakeClient {
            completed: TokioMutex::new(BTreeSet::new()),
            assignment: TokioMutex::new(HashMap::new()),
        });
        let mut config = TrackerConfig::default();
        config.max_retry_attempts = 2;
        let tracker = CompletionTracker::new(client, Arc::new(EmptyWindow), config);
        tracker.register(test_dr("dr-b")).await;
        tracker.poll_once().await;
        assert_eq!(tracker.tracked_count().await, 1);
        tracker.poll_once().await;
        assert_eq!(tracker.tracked_count().await, 0, "abandoned after 2 failed attempts");
    }

    #[tokio::test]
    async fn batch_window_fallback_finds_assignment_when_direct_query_misses() {
        let client = Arc::new(FakeClient {
            completed: TokioMutex::new(BTreeSet::from(["dr-c".to_string()])),
            assignment: TokioMutex::new(HashMap::new()),
        });
        struct OneBatch;
        #[async_trait]
        impl BatchWindowSource for OneBatch {
            async fn recent_batches(&self, _window: u32) -> Vec<Batch> {
                vec![Batch {
                    batch_number: 7,
                    batch_id: [0u8; 32],
                    block_height: 200,
                    data_result_root: [0u8; 32],
                    validator_root: [0u8; 32],
                    signatures: vec![],
                    validator_entries: vec![],
                    data_request_ids: vec!["dr-c".to_string()],
                }]
            }
        }
        let tracker = CompletionTracker::new(client, Arc::new(OneBatch), TrackerConfig::default());
        tracker.register(test_dr("dr-c")).await;
        tracker.poll_once().await;
        assert_eq!(tracker.take_newly_ready_batches().await, vec![7]);
    }
}
