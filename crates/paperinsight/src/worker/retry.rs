//! Explicit retry policy owned by the scheduler/worker boundary.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    2000
}
fn default_multiplier() -> f64 {
    2.0
}

/// Bounded retry with exponential backoff. A multiplier of 1.0 gives a
/// fixed delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts a job may consume, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Whether a job that just failed its `attempt`-th attempt may be
    /// re-delivered.
    pub fn attempts_remaining(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before re-delivering a job that failed its `attempt`-th
    /// attempt: `initial * multiplier^(attempt - 1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let millis = self.initial_backoff_ms as f64 * self.multiplier.powi(exp as i32);
        Duration::from_millis(millis as u64)
    }

    /// A policy with no delay between attempts, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            multiplier: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_progression() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_backoff_ms: 100,
            multiplier: 2.0,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_fixed_delay_with_unit_multiplier() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 50,
            multiplier: 1.0,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for(5), Duration::from_millis(50));
    }

    #[test]
    fn test_attempt_bound() {
        let policy = RetryPolicy::immediate(3);
        assert!(policy.attempts_remaining(1));
        assert!(policy.attempts_remaining(2));
        assert!(!policy.attempts_remaining(3));
        assert!(!policy.attempts_remaining(4));
    }

    #[test]
    fn test_immediate_policy_has_zero_delay() {
        let policy = RetryPolicy::immediate(2);
        assert!(policy.delay_for(1).is_zero());
    }
}
