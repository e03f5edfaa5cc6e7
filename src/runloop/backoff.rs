//! Exponential backoff between retry attempts.

use std::time::Duration;

use crate::config::RetryConfig;

/// Exponential backoff with a hard cap
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    base_seconds: f64,
    multiplier: f64,
    cap_seconds: f64,
}

impl BackoffPolicy {
    pub fn new(base_seconds: f64, multiplier: f64, cap_seconds: f64) -> Self {
        Self {
            base_seconds,
            multiplier,
            cap_seconds,
        }
    }

    pub fn from_retry(retry: &RetryConfig) -> Self {
        Self::new(
            retry.backoff_base_seconds,
            retry.backoff_multiplier,
            retry.backoff_cap_seconds,
        )
    }

    /// Delay before the next attempt after `failure_count` consecutive
    /// failures (1-indexed): `base * multiplier^(failure_count - 1)`,
    /// capped.
    pub fn delay(&self, failure_count: u32) -> Duration {
        let exponent = failure_count.saturating_sub(1);
        let raw = self.base_seconds * self.multiplier.powi(exponent as i32);
        let capped = if raw.is_finite() {
            raw.min(self.cap_seconds)
        } else {
            self.cap_seconds
        };
        Duration::from_secs_f64(capped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_delay_is_base() {
        let policy = BackoffPolicy::new(1.0, 2.0, 60.0);
        assert_eq!(policy.delay(1), Duration::from_secs(1));
    }

    #[test]
    fn test_delays_grow_exponentially() {
        let policy = BackoffPolicy::new(1.0, 2.0, 60.0);
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(4), Duration::from_secs(8));
    }

    #[test]
    fn test_delays_non_decreasing() {
        let policy = BackoffPolicy::new(0.5, 1.7, 30.0);
        let mut previous = Duration::ZERO;
        for n in 1..=20 {
            let delay = policy.delay(n);
            assert!(delay >= previous, "delay shrank at attempt {}", n);
            previous = delay;
        }
    }

    #[test]
    fn test_cap_applies() {
        let policy = BackoffPolicy::new(1.0, 2.0, 5.0);
        assert_eq!(policy.delay(10), Duration::from_secs(5));
        assert_eq!(policy.delay(100), Duration::from_secs(5));
    }

    #[test]
    fn test_overflow_saturates_to_cap() {
        let policy = BackoffPolicy::new(1.0, 10.0, 120.0);
        // 10^999 is not finite in f64; the cap still holds
        assert_eq!(policy.delay(1000), Duration::from_secs(120));
    }

    #[test]
    fn test_multiplier_of_one_is_constant() {
        let policy = BackoffPolicy::new(2.0, 1.0, 60.0);
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(5), Duration::from_secs(2));
    }

    #[test]
    fn test_from_retry_config() {
        let retry = RetryConfig {
            max_retries: 3,
            backoff_base_seconds: 0.25,
            backoff_multiplier: 3.0,
            backoff_cap_seconds: 10.0,
        };
        let policy = BackoffPolicy::from_retry(&retry);
        assert_eq!(policy.delay(1), Duration::from_millis(250));
        assert_eq!(policy.delay(2), Duration::from_millis(750));
    }
}
