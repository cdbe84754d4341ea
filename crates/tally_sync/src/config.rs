//! Configuration for the queue store and processor.

use rand::Rng;
use std::time::Duration;

/// Storage key holding the queue document.
pub const DEFAULT_QUEUE_KEY: &str = "tally:offline-queue";

/// Replay attempts before an operation is dropped.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Configuration for the persistent queue store.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Key under which the whole queue is stored.
    pub storage_key: String,
}

impl QueueConfig {
    /// Creates a configuration with the default key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the storage key.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_QUEUE_KEY.to_string(),
        }
    }
}

/// Configuration for the queue processor.
#[derive(Debug, Clone, Default)]
pub struct ProcessorConfig {
    /// Retry policy applied to failed operations.
    pub retry: RetryPolicy,
}

impl ProcessorConfig {
    /// Creates a configuration with the default retry policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Retry behavior for failed replays.
///
/// An operation is attempted at most `max_attempts` times in total, one
/// attempt per processing pass. With a zero `initial_delay` (the default) a
/// retried entry is dispatched immediately; otherwise the processor waits
/// [`RetryPolicy::delay_for_attempt`] before re-dispatching it.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryPolicy {
    /// Creates a policy with a fixed attempt ceiling and no delay.
    pub fn fixed(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Creates a policy with exponential backoff starting at `initial_delay`.
    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Returns true once `retry_count` failures exhaust the policy.
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_attempts
    }

    /// Returns how long to wait before re-dispatching an entry that has
    /// already failed `retry_count` times.
    ///
    /// The wait grows by `backoff_multiplier` per failure, is capped at
    /// `max_delay`, and with jitter enabled is stretched by a random factor
    /// in `[1.0, 1.25)`.
    pub fn delay_for_attempt(&self, retry_count: u32) -> Duration {
        if retry_count == 0 || self.initial_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(retry_count - 1).unwrap_or(i32::MAX);
        let growth = self.backoff_multiplier.powi(exponent);
        let capped = Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * growth)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay));

        if !self.add_jitter {
            return capped;
        }
        let stretch = rand::thread_rng().gen_range(0.0..0.25);
        capped.mul_f64(1.0 + stretch)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_MAX_ATTEMPTS)
    }
}
