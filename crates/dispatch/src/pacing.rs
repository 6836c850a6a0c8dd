//! Per-worker pacing after successful generations
//!
//! Each worker owns one `Pacer`. After every success the worker sleeps for the
//! configured interval before it takes the next job, which caps that worker
//! at roughly one image per interval. This is not a global limiter: the
//! provider enforces the real quota and reports it as quota exhaustion.

use std::time::Duration;

use tracing::debug;

#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    paced: u64,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval, paced: 0 }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of successes this pacer has throttled.
    pub fn paced(&self) -> u64 {
        self.paced
    }

    /// Wait out the pacing interval following a successful artifact.
    pub async fn after_success(&mut self) {
        self.paced += 1;
        if self.interval.is_zero() {
            return;
        }
        debug!(interval_ms = self.interval.as_millis() as u64, "pacing worker");
        tokio::time::sleep(self.interval).await;
    }
}
