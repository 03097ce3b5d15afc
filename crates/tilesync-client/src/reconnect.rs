//! Reconnect backoff for the push channel.
//!
//! Exponential: min(2^(attempt-1) * base, max) plus up to `jitter` of random
//! spread. Zero before the first failure.

use std::time::Duration;

use rand::Rng;

/// Doublings after which the delay stops growing before the cap applies.
const BACKOFF_SATURATION: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failures tolerated before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
    pub jitter: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: None,
            jitter: Duration::from_millis(250),
        }
    }
}

impl ReconnectPolicy {
    /// Deterministic part of the delay before retry number `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32 << (attempt - 1).min(BACKOFF_SATURATION);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff plus random jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let backoff = self.backoff(attempt);
        if backoff.is_zero() || self.jitter.is_zero() {
            return backoff;
        }
        let jitter_ms = self.jitter.as_millis() as u64;
        backoff + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }

    /// Whether retry number `attempt` is still permitted.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }
}
