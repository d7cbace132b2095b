//! Backoff delay computation.
//!
//! Two pure steps, both driven by a [`RetryPolicy`]:
//!
//! - [`Backoff::next_delay`] turns the current delay into the delay to sleep
//!   for: `min(current * jitter, max_delay)` where `jitter` is drawn from the
//!   configured [`Jitter`] range (standard: uniform in `[0.8, 1.2]`).
//! - [`Backoff::grow`] advances the current delay between attempts:
//!   `min(current * multiplier, max_delay)`. Growth never sees the jitter draw,
//!   so concurrent callers spread out without drifting off the exponential
//!   curve.
//!
//! Float products that overflow `Duration` saturate to `max_delay`.
//!
//! ```rust
//! use secondwind::{Backoff, Jitter, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::default();
//! let backoff = Backoff::new(Jitter::None);
//! assert_eq!(backoff.next_delay(Duration::from_secs(1), &policy), Duration::from_secs(1));
//! assert_eq!(backoff.grow(Duration::from_secs(8), &policy), Duration::from_secs(10)); // capped
//! ```

use crate::error::PolicyError;
use crate::policy::RetryPolicy;
use rand::{rng, Rng};
use std::time::Duration;

/// Lower bound of the standard jitter factor.
pub const JITTER_LOW: f64 = 0.8;
/// Upper bound of the standard jitter factor.
pub const JITTER_HIGH: f64 = 1.2;

/// Randomization applied to each delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Jitter {
    /// Use the current delay as-is.
    None,
    /// Multiply by a factor drawn uniformly from a validated range.
    Proportional(ProportionalRange),
}

/// Jitter factor bounds: finite, with `0 <= low <= high`.
///
/// Fields are private so every range goes through [`ProportionalRange::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProportionalRange {
    low: f64,
    high: f64,
}

impl ProportionalRange {
    pub fn new(low: f64, high: f64) -> Result<Self, PolicyError> {
        if !low.is_finite() || !high.is_finite() || low < 0.0 || low > high {
            return Err(PolicyError::InvalidJitter { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }
}

impl Jitter {
    /// The standard `[0.8, 1.2]` range.
    pub fn standard() -> Self {
        Jitter::Proportional(ProportionalRange { low: JITTER_LOW, high: JITTER_HIGH })
    }

    /// A custom factor range. Bounds must be finite with `0 <= low <= high`.
    pub fn proportional(low: f64, high: f64) -> Result<Self, PolicyError> {
        ProportionalRange::new(low, high).map(Jitter::Proportional)
    }

    fn factor<R: Rng>(&self, rng: &mut R) -> f64 {
        match *self {
            Jitter::None => 1.0,
            Jitter::Proportional(ProportionalRange { low, high }) if low == high => low,
            Jitter::Proportional(ProportionalRange { low, high }) => rng.random_range(low..=high),
        }
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Jitter::standard()
    }
}

/// Delay calculator used by the coordinator between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Backoff {
    jitter: Jitter,
}

impl Backoff {
    pub fn new(jitter: Jitter) -> Self {
        Self { jitter }
    }

    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// Delay to sleep before the next attempt, using the thread-local RNG.
    pub fn next_delay(&self, current: Duration, policy: &RetryPolicy) -> Duration {
        self.next_delay_with_rng(current, policy, &mut rng())
    }

    /// Same as [`Backoff::next_delay`] with an injected RNG (deterministic tests).
    pub fn next_delay_with_rng<R: Rng>(
        &self,
        current: Duration,
        policy: &RetryPolicy,
        rng: &mut R,
    ) -> Duration {
        scale_capped(current, self.jitter.factor(rng), policy.max_delay())
    }

    /// Advance the current delay by the policy multiplier, capped at `max_delay`.
    pub fn grow(&self, current: Duration, policy: &RetryPolicy) -> Duration {
        scale_capped(current, policy.multiplier(), policy.max_delay())
    }
}

fn scale_capped(delay: Duration, factor: f64, cap: Duration) -> Duration {
    // try_from_secs_f64 rejects negative, NaN and out-of-range products
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(cap).min(cap)
}
