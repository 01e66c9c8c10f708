//! Push retry policy.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff between push attempts.
///
/// Attempt `n` (zero based) waits `min * factor^n`, capped at `max`. With
/// jitter enabled the wait is drawn uniformly from `[min, capped]`.
#[derive(Debug, Clone)]
pub struct PushBackoff {
    min: Duration,
    max: Duration,
    factor: f64,
    jitter: bool,
    max_attempts: u32,
}

impl Default for PushBackoff {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: true,
            max_attempts: 3,
        }
    }
}

impl PushBackoff {
    /// Creates a jittered policy doubling from `min` up to `max`.
    pub fn new(min: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            min,
            max: max.max(min),
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Disables jitter, making delays deterministic.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Total number of attempts, including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the wait before retrying after failed attempt `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self.factor.powi(attempt.min(32) as i32);
        let capped = self.min.mul_f64(exp).min(self.max);

        if !self.jitter || capped <= self.min {
            return capped;
        }

        let spread = (capped - self.min).as_secs_f64();
        self.min + Duration::from_secs_f64(rand::rng().random_range(0.0..=spread))
    }
}
