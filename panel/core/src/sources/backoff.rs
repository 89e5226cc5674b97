//! Poll Backoff
//!
//! Tracks consecutive failures of one source and spaces out further polls with
//! an exponential delay. A source in backoff is simply skipped; the caller
//! shows empty output as it would for a failed poll.

use std::time::{Duration, Instant};

/// Exponential backoff parameters
#[derive(Clone, Debug)]
pub struct BackoffConfig {
    /// Delay after the first failure
    pub initial_backoff_ms: u64,

    /// Upper bound for the delay
    pub max_backoff_ms: u64,

    /// Growth factor per additional failure
    pub backoff_multiplier: f32,

    /// Add up to 25% random jitter
    pub use_jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 5_000,
            max_backoff_ms: 600_000, // 10 minutes
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl BackoffConfig {
    /// Calculate backoff duration for attempt N (0-indexed)
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_backoff_ms as f64 * f64::from(self.backoff_multiplier).powi(exponent);
        let capped = base.min(self.max_backoff_ms as f64);

        let duration_ms = if self.use_jitter {
            let jitter = rand::random::<f64>() * 0.25;
            (capped * (1.0 + jitter)) as u64
        } else {
            capped as u64
        };

        Duration::from_millis(duration_ms)
    }
}

/// Failure tracker for a single source
#[derive(Debug)]
pub struct PollBackoff {
    config: BackoffConfig,
    consecutive_failures: u32,
    retry_at: Option<Instant>,
}

impl PollBackoff {
    /// Create a tracker in the healthy state
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
            retry_at: None,
        }
    }

    /// Whether the source may be polled at `now`
    #[must_use]
    pub fn should_poll(&self, now: Instant) -> bool {
        self.retry_at.map_or(true, |at| now >= at)
    }

    /// Reset after a successful poll
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.retry_at = None;
    }

    /// Register a failed poll and return the delay until the next attempt
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        let delay = self.config.delay_for_attempt(self.consecutive_failures);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.retry_at = Some(now + delay);
        delay
    }

    /// Failures since the last success
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> BackoffConfig {
        BackoffConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
            backoff_multiplier: 2.0,
            use_jitter: false,
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let config = no_jitter();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(1_000));
        assert_eq!(config.delay_for_attempt(40), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let config = BackoffConfig {
            use_jitter: true,
            ..no_jitter()
        };
        for _ in 0..50 {
            let delay = config.delay_for_attempt(0);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(125));
        }
    }

    #[test]
    fn test_backoff_blocks_until_delay_elapsed() {
        let mut backoff = PollBackoff::new(no_jitter());
        let start = Instant::now();
        assert!(backoff.should_poll(start));

        let delay = backoff.record_failure(start);
        assert_eq!(delay, Duration::from_millis(100));
        assert!(!backoff.should_poll(start));
        assert!(!backoff.should_poll(start + Duration::from_millis(99)));
        assert!(backoff.should_poll(start + delay));

        let second = backoff.record_failure(start + delay);
        assert_eq!(second, Duration::from_millis(200));
        assert_eq!(backoff.consecutive_failures(), 2);
    }

    #[test]
    fn test_success_resets() {
        let mut backoff = PollBackoff::new(no_jitter());
        let start = Instant::now();
        backoff.record_failure(start);
        backoff.record_failure(start);

        backoff.record_success();
        assert_eq!(backoff.consecutive_failures(), 0);
        assert!(backoff.should_poll(start));
    }
}
