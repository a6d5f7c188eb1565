//! Exponential-backoff retry loop around a [`Transport`].

use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use runcast_common::config::NotifierConfig;
use runcast_common::types::Envelope;

use crate::transport::{Outcome, Transport};

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(10);
/// Default total number of send attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default cap for a single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

/// Backoff parameters for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn exponential(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    pub fn from_config(config: &NotifierConfig) -> Self {
        Self {
            base_delay: config.retry_base(),
            max_attempts: config.max_attempts.max(1),
            max_delay: config.max_delay(),
        }
    }

    /// Delay to wait after the given (1-based) failed attempt: `base * 2^(attempt-1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// How a retry loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryResult {
    Acknowledged { attempts: u32 },
    /// Out of attempts, or the transport said retrying is pointless.
    Exhausted { attempts: u32, last_error: String },
    /// Cancelled before an acknowledgment. `attempts` counts sends that started.
    Cancelled { attempts: u32 },
}

/// Send `envelope` until it is acknowledged, attempts run out, or `cancel` fires.
pub async fn send_with_retries(
    transport: &dyn Transport,
    envelope: &Envelope,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> RetryResult {
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return RetryResult::Cancelled { attempts: attempt };
        }
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return RetryResult::Cancelled { attempts: attempt },
            outcome = transport.send(envelope) => outcome,
        };

        let (reason, retryable) = match outcome {
            Outcome::Acknowledged => return RetryResult::Acknowledged { attempts: attempt },
            Outcome::Rejected { reason, retryable } => (reason, retryable),
        };

        if !retryable || attempt >= policy.max_attempts {
            return RetryResult::Exhausted {
                attempts: attempt,
                last_error: reason,
            };
        }

        let delay = policy.delay_after(attempt);
        debug!(
            transport = transport.name(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %reason,
            "Send rejected, retrying"
        );

        tokio::select! {
            _ = cancel.cancelled() => return RetryResult::Cancelled { attempts: attempt },
            _ = sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_from_base() {
        let policy = RetryPolicy::exponential(Duration::from_millis(10), 10);
        assert_eq!(policy.delay_after(1), Duration::from_millis(10));
        assert_eq!(policy.delay_after(2), Duration::from_millis(20));
        assert_eq!(policy.delay_after(4), Duration::from_millis(80));
    }

    #[test]
    fn test_delay_capped() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            max_attempts: 50,
            max_delay: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_after(5), Duration::from_secs(1));
        assert_eq!(policy.delay_after(40), Duration::from_secs(1));
    }

    #[test]
    fn test_from_config() {
        let config = NotifierConfig {
            retry_base_ms: 15,
            max_attempts: 4,
            max_delay_ms: 200,
            ..Default::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.base_delay, Duration::from_millis(15));
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.max_delay, Duration::from_millis(200));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::exponential(Duration::ZERO, 0).max_attempts, 1);
    }
}
