// src/engine/retry.rs

//! Retry policy: decides backoff delays.

use std::time::Duration;

use rand::Rng;

use crate::config::model::RetrySection;

/// Whether an instance that has made `attempt` attempts may try again.
pub fn should_retry(attempt: u32, max_attempts: u32) -> bool {
    attempt < max_attempts
}

/// Exponential backoff without jitter: `base * 2^(attempt - 1)`, capped at
/// `max`. `attempt` is 1-indexed; 0 is treated like 1.
pub fn backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(63);
    let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(Duration::MAX).min(max)
}

/// Global retry settings. The base delay is per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound for any delay, jitter included.
    pub max_delay: Duration,
    /// Add uniform jitter in `[0, base)`.
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_section(section: &RetrySection) -> Self {
        Self {
            max_delay: Duration::from_secs(section.max_delay_secs),
            jitter: section.jitter,
        }
    }

    /// Delay before the next attempt after `attempt` attempts failed.
    ///
    /// With base 1s and no jitter: 1s, 2s, 4s, 8s, ... up to `max_delay`.
    pub fn next_delay(&self, attempt: u32, base: Duration) -> Duration {
        self.next_delay_with_rng(attempt, base, &mut rand::thread_rng())
    }

    /// [`Self::next_delay`] with a caller-provided random source.
    pub fn next_delay_with_rng<R: Rng + ?Sized>(
        &self,
        attempt: u32,
        base: Duration,
        rng: &mut R,
    ) -> Duration {
        let delay = backoff(attempt, base, Duration::MAX);
        let jitter = if self.jitter && !base.is_zero() {
            base.mul_f64(rng.gen_range(0.0..1.0))
        } else {
            Duration::ZERO
        };
        delay.saturating_add(jitter).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_section(&RetrySection::default())
    }
}
