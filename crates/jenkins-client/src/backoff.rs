//! Growing poll interval.

use std::time::Duration;

use crate::error::ClientError;

/// Geometric back-off: start at `initial`, multiply by `factor` after each
/// poll, never exceed `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// First interval.
    pub initial: Duration,
    /// Growth factor, at least 1.
    pub factor: f64,
    /// Upper bound on any interval.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            factor: 1.5,
            max: Duration::from_secs(15),
        }
    }
}

impl BackoffPolicy {
    /// Check the policy can make progress.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for a zero interval, `initial > max`,
    /// or a factor below 1 (or not finite).
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.initial.is_zero() || self.max.is_zero() {
            return Err(ClientError::Config("poll intervals must be positive".into()));
        }
        if self.initial > self.max {
            return Err(ClientError::Config(format!(
                "initial poll interval {:?} exceeds maximum {:?}",
                self.initial, self.max
            )));
        }
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(ClientError::Config(format!(
                "poll growth factor must be at least 1, got {}",
                self.factor
            )));
        }
        Ok(())
    }

    /// Interval sequence for one wait.
    #[must_use]
    pub const fn intervals(&self) -> Backoff {
        Backoff {
            policy: *self,
            next: self.initial,
        }
    }
}

/// Iterator state for a [`BackoffPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    next: Duration,
}

impl Backoff {
    /// Interval to wait now; advances the sequence.
    pub fn next_interval(&mut self) -> Duration {
        let current = self.next;
        self.next = Duration::try_from_secs_f64(self.next.as_secs_f64() * self.policy.factor)
            .map_or(self.policy.max, |d| d.max(current).min(self.policy.max));
        current
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_interval())
    }
}
