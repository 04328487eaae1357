//! Bounded polling shared by element resolution and assertions.
//!
//! A [`Poller`] owns one retry budget: callers check their condition, and on
//! failure call [`Poller::wait`], which sleeps for the current interval and
//! reports whether another attempt is allowed. The final attempt always
//! happens at (or just before) the deadline.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total timeout duration
    pub timeout: Duration,
    /// Interval before the second attempt
    pub poll_interval: Duration,
    /// Multiplier applied to the interval after each failed attempt
    pub backoff: f64,
    /// Upper bound for the interval
    pub max_interval: Duration,
    /// Maximum number of attempts (0 = unlimited within timeout)
    pub max_retries: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(4),
            poll_interval: Duration::from_millis(50),
            backoff: 1.5,
            max_interval: Duration::from_millis(500),
            max_retries: 0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with timeout
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Set the timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the backoff multiplier (values below 1.0 are treated as 1.0)
    #[must_use]
    pub const fn with_backoff(mut self, backoff: f64) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the interval ceiling
    #[must_use]
    pub const fn with_max_interval(mut self, max: Duration) -> Self {
        self.max_interval = max;
        self
    }

    /// Set maximum attempts
    #[must_use]
    pub const fn with_max_retries(mut self, max: usize) -> Self {
        self.max_retries = max;
        self
    }

    /// Create a fast config (short timeout, fast polling)
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(10),
            backoff: 1.0,
            max_interval: Duration::from_millis(10),
            max_retries: 0,
        }
    }

    /// Create a slow config (long timeout, slower polling)
    #[must_use]
    pub const fn slow() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            backoff: 1.0,
            max_interval: Duration::from_millis(500),
            max_retries: 0,
        }
    }

    /// Timeout in whole milliseconds, for error messages
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// One retry budget in progress
#[derive(Debug)]
pub struct Poller {
    config: RetryConfig,
    started: Instant,
    attempts: usize,
    interval: Duration,
}

impl Poller {
    /// Start the clock
    #[must_use]
    pub fn start(config: &RetryConfig) -> Self {
        Self {
            config: *config,
            started: Instant::now(),
            attempts: 0,
            interval: config.poll_interval,
        }
    }

    /// Failed attempts so far
    #[must_use]
    pub const fn attempts(&self) -> usize {
        self.attempts
    }

    /// Time since start
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record a failed attempt and sleep before the next one
    ///
    /// Returns `false` without sleeping once the budget is spent.
    pub async fn wait(&mut self) -> bool {
        self.attempts += 1;
        if self.config.max_retries > 0 && self.attempts >= self.config.max_retries {
            return false;
        }
        let elapsed = self.started.elapsed();
        if elapsed >= self.config.timeout {
            return false;
        }
        let nap = self.interval.min(self.config.timeout - elapsed);
        tokio::time::sleep(nap).await;

        let ceiling = self.config.max_interval.max(self.config.poll_interval);
        let factor = self.config.backoff.max(1.0);
        // products past the range of Duration saturate at the ceiling
        self.interval = Duration::try_from_secs_f64(self.interval.as_secs_f64() * factor)
            .map_or(ceiling, |next| next.min(ceiling));
        true
    }
}
