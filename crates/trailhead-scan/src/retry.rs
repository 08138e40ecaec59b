use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::scan_types::ScanError;

/// Bounded fixed-interval retry for calls against flaky upstream services.
///
/// Call sites run their own attempt loop and consult the policy between
/// attempts, so they stay free to do per-attempt recovery work such as
/// invalidating an expired session.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempt budget, counting the first try
    pub max_attempts: u32,

    /// Fixed pause between attempts
    pub retry_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_interval: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// Build a policy with an explicit budget and pause.
    pub fn new(max_attempts: u32, retry_interval: Duration) -> Self {
        Self {
            max_attempts,
            retry_interval,
        }
    }

    /// Whether another attempt should follow the given failure.
    ///
    /// `attempt` is zero-based, so the first try is attempt 0. Fatal
    /// errors never retry regardless of remaining budget.
    pub fn should_retry(&self, attempt: u32, error: &ScanError) -> bool {
        attempt + 1 < self.max_attempts && error.is_retryable()
    }

    /// Wait out the interval before the next attempt.
    pub async fn pause(&self) {
        debug!("Waiting {:?} before retrying", self.retry_interval);
        sleep(self.retry_interval).await;
    }
}
