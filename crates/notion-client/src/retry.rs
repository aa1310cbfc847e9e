use std::time::Duration;

pub use exponential_backoff::Backoff;

/// Determines how many times a transient failure is retried and how long to
/// wait between attempts. The schedule is exponential between `min` and
/// `max`; a server-advised interval (Retry-After) overrides the schedule but
/// is still capped at `max`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    min: Duration,
    max: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        RetryPolicy {
            max_retries,
            min: Duration::from_millis(500),
            max: Duration::from_secs(60),
        }
    }

    /// The wait before retry number `attempt` (1-based), or None once the
    /// budget is spent.
    pub fn next_backoff(&self, attempt: u32) -> Option<Duration> {
        if attempt > self.max_retries {
            return None;
        }
        let backoff = Backoff::new(self.max_retries, self.min, Some(self.max));
        backoff.next(attempt)
    }

    /// Caps a server-advised retry interval to the policy's maximum.
    pub fn clamp(&self, advised: Duration) -> Duration {
        advised.min(self.max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(5)
    }
}
