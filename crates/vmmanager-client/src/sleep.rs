//! Suspension points.
//!
//! Every wait in the client (backoff between read attempts, the interval between
//! task status checks) goes through [`Sleeper`], so tests can observe the exact
//! delays without spending wall-clock time.

use async_trait::async_trait;
use std::time::Duration;

/// Asynchronous delay provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend the calling task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
