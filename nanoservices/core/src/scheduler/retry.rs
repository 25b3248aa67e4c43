use eltflow_utils::error::Error;
use std::time::Duration;

/// How often a failed step is retried and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Whether to try again after `attempt` (1-based) failed with `err`.
    /// Only transient errors are retried.
    pub fn should_retry(&self, attempt: u32, err: &Error) -> bool {
        attempt < self.max_attempts() && err.is_transient()
    }
}

impl Default for RetryPolicy {
    /// One retry after two minutes.
    fn default() -> Self {
        Self::new(1, Duration::from_secs(120))
    }
}
