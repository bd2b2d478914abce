//! Exponential backoff for transient API failures.
//!
//! Failures are classified into a [`FailureKind`]; the [`RetryPolicy`] then
//! decides whether another attempt is worth making and how long to wait.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

/// Default maximum attempts, including the first request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);
const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(250);

/// How a failed request should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeout, connection error, 408, 5xx.
    Transient,
    /// HTTP 429.
    RateLimited,
    /// 401 / 403: the key is missing or refused.
    Auth,
    /// Any other 4xx.
    Rejected,
}

impl FailureKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::Transient | FailureKind::RateLimited)
    }
}

/// Map an HTTP status to a failure kind.
#[allow(clippy::match_same_arms)]
pub fn classify_status(status: u16) -> FailureKind {
    match status {
        401 | 403 => FailureKind::Auth,
        408 => FailureKind::Transient,
        429 => FailureKind::RateLimited,
        500..=599 => FailureKind::Transient,
        _ => FailureKind::Rejected,
    }
}

/// Backoff configuration.
///
/// ```text
/// delay(n) = min(base_delay * 2^(n-1), max_delay) + jitter
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    /// A single attempt, no retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    #[must_use]
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt, or `None` to give up.
    ///
    /// `attempt` is the 1-indexed attempt that just failed.
    pub fn next_delay(&self, kind: FailureKind, attempt: u32) -> Option<Duration> {
        if !kind.is_retryable() {
            return None;
        }
        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "retries exhausted");
            return None;
        }
        let delay = self.backoff(attempt) + self.jitter();
        debug!(attempt, delay_ms = delay.as_millis() as u64, ?kind, "will retry");
        Some(delay)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}
