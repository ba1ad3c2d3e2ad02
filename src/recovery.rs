use std::time::Duration;

/// Exponential backoff shape shared by reconnects and deliveries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Delay to wait after the given number of prior failures (0-based)
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);

        if delay > self.max_delay {
            self.max_delay
        } else {
            delay
        }
    }

    /// Start a fresh delay sequence
    pub fn start(&self) -> Backoff {
        Backoff {
            policy: *self,
            retries_used: 0,
        }
    }
}

/// Running backoff sequence: 2, 4, 8, ... capped
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    retries_used: u32,
}

impl Backoff {
    /// Number of delays handed out so far
    pub fn retries_used(&self) -> u32 {
        self.retries_used
    }

    /// Delay the next `next_delay` call will return
    pub fn peek(&self) -> Duration {
        self.policy.delay_for(self.retries_used)
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.peek();
        self.retries_used = self.retries_used.saturating_add(1);
        delay
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}
