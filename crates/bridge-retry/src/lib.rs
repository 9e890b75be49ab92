// Path: crates/bridge-retry/src/lib.rs
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

//! # SEDA Bridge Retry Kernel (C1)
//!
//! Two stateless, composable primitives used by every other crate that talks to
//! an external chain: [`retry`] for exponential-backoff retries, and
//! [`with_deadline`] for deadline-bounded execution. Neither holds any state of
//! its own; callers supply the operation as a closure returning a future.

use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Error surfaced by [`with_deadline`] when the operation does not complete in time.
#[derive(Debug, Error)]
#[error("operation timed out after {0:?}: {1}")]
pub struct DeadlineExceeded(pub Duration, pub String);

/// Backoff parameters shared by every retrying call site.
///
/// Delay for attempt `k` (1-indexed) is `min(initial_delay * multiplier^(k-1), max_delay)`,
/// deterministic and jitter-free.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
    /// Hard ceiling on the delay between attempts.
    pub max_delay: Duration,
}

impl BackoffConfig {
    /// Returns the delay to sleep before attempt `attempt` (1-indexed), given that
    /// `attempt - 1` prior attempts have already failed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi((attempt.max(1) - 1) as i32);
        let millis = (self.initial_delay.as_secs_f64() * exp * 1000.0).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis.max(0.0) as u64)
    }
}

/// Retries `op` up to `config.max_attempts` times, sleeping between attempts per
/// [`BackoffConfig::delay_for_attempt`]. Returns the first success or the last
/// error observed.
pub async fn retry<T, E, F, Fut>(config: BackoffConfig, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= config.max_attempts {
                    return Err(err);
                }
                let delay = config.delay_for_attempt(attempt);
                warn!(attempt, ?delay, error = %err, "retrying after failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Races `op` against a `timeout` timer. On expiry, `op`'s future is dropped
/// (cancelling any work it was driving) and a [`DeadlineExceeded`] error carrying
/// `msg` is returned instead of `op`'s own error type, so callers always get a
/// uniform timeout signal regardless of which branch wins.
pub async fn with_deadline<T, Fut>(
    timeout: Duration,
    msg: impl Into<String>,
    op: Fut,
) -> Result<T, DeadlineExceeded>
where
    Fut: std::future::Future<Output = T>,
{
    match tokio::time::timeout(timeout, op).await {
        Ok(value) => Ok(value),
        Err(_) => Err(DeadlineExceeded(timeout, msg.into())),
    }
}
