//! Retry options attached to each job at enqueue time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// `delay * 2^(attempt - 1)`.
    Exponential,
    /// Same delay before every retry.
    Fixed,
}

/// Backoff policy for retried attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backoff {
    /// Growth strategy.
    pub kind: BackoffKind,
    /// Base delay in milliseconds.
    pub delay_ms: u64,
}

impl Backoff {
    /// Largest exponent applied; keeps the delay from overflowing.
    const MAX_SHIFT: u32 = 20;

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempts_made: u32) -> Duration {
        let ms = match self.kind {
            BackoffKind::Fixed => self.delay_ms,
            BackoffKind::Exponential => {
                let shift = attempts_made.saturating_sub(1).min(Self::MAX_SHIFT);
                self.delay_ms.saturating_mul(1u64 << shift)
            }
        };
        Duration::from_millis(ms)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            kind: BackoffKind::Exponential,
            delay_ms: 5000,
        }
    }
}

/// Options fixed for the lifetime of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    /// Total attempts allowed, including the first.
    pub attempts: u32,
    /// Delay policy between attempts.
    pub backoff: Backoff,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_doubles() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay_for(1), Duration::from_millis(5000));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(10_000));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(20_000));
    }

    #[test]
    fn test_fixed_backoff_is_constant() {
        let backoff = Backoff {
            kind: BackoffKind::Fixed,
            delay_ms: 250,
        };
        assert_eq!(backoff.delay_for(1), backoff.delay_for(7));
    }

    #[test]
    fn test_exponent_is_capped() {
        let backoff = Backoff {
            kind: BackoffKind::Exponential,
            delay_ms: u64::MAX / 2,
        };
        assert_eq!(backoff.delay_for(64), Duration::from_millis(u64::MAX));
    }
}
