//! Retry policy configuration.
//!
//! A [`RetryPolicy`] is an immutable value: attempt budget, initial delay,
//! delay cap and growth multiplier. It carries no behavior of its own; the
//! coordinator reads it at the start of each run.
//!
//! Named presets:
//!
//! | preset          | attempts | initial | max  | multiplier |
//! |-----------------|----------|---------|------|------------|
//! | `default`       | 3        | 1s      | 10s  | 2.0        |
//! | `aggressive`    | 5        | 500ms   | 15s  | 2.0        |
//! | `conservative`  | 3        | 1s      | 10s  | 2.0        |
//!
//! `conservative` carries the same numbers as `default`. Both stay as separate
//! entry points so call sites can state intent.
//!
//! ```rust
//! use secondwind::{Preset, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_attempts(4)
//!     .initial_delay(Duration::from_millis(200))
//!     .max_delay(Duration::from_secs(5))
//!     .multiplier(1.5)
//!     .build()
//!     .unwrap();
//! assert_eq!(policy.max_attempts(), 4);
//!
//! let aggressive: Preset = "aggressive".parse().unwrap();
//! assert_eq!(aggressive.policy(), RetryPolicy::aggressive());
//! ```

use crate::error::PolicyError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_MULTIPLIER: f64 = 2.0;

const AGGRESSIVE_MAX_ATTEMPTS: u32 = 5;
const AGGRESSIVE_INITIAL_DELAY: Duration = Duration::from_millis(500);
const AGGRESSIVE_MAX_DELAY: Duration = Duration::from_secs(15);
const AGGRESSIVE_MULTIPLIER: f64 = 2.0;

/// Attempt budget and delay curve for one retried operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl RetryPolicy {
    /// Start from the default preset and adjust.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// More attempts, shorter first delay. Used for network calls.
    pub const fn aggressive() -> Self {
        Self {
            max_attempts: AGGRESSIVE_MAX_ATTEMPTS,
            initial_delay: AGGRESSIVE_INITIAL_DELAY,
            max_delay: AGGRESSIVE_MAX_DELAY,
            multiplier: AGGRESSIVE_MULTIPLIER,
        }
    }

    /// Same values as the default preset.
    pub const fn conservative() -> Self {
        Self::standard()
    }

    const fn standard() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }

    /// Total attempts, including the first call.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Builder seeded with this policy's values.
    pub fn to_builder(&self) -> RetryPolicyBuilder {
        RetryPolicyBuilder { policy: *self }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Builder for [`RetryPolicy`]; validates on [`build`](RetryPolicyBuilder::build).
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self { policy: RetryPolicy::default() }
    }

    /// Total attempts (initial + retries). Must be >= 1.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Cap on every delay. Must be >= `initial_delay`.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Growth factor between attempts. Must be finite and >= 1.0.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    pub fn build(self) -> Result<RetryPolicy, PolicyError> {
        let p = self.policy;
        if p.max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if p.max_delay < p.initial_delay {
            return Err(PolicyError::MaxBelowInitial { initial: p.initial_delay, max: p.max_delay });
        }
        if !p.multiplier.is_finite() || p.multiplier < 1.0 {
            return Err(PolicyError::InvalidMultiplier(p.multiplier));
        }
        Ok(p)
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Named policy presets, selectable from configuration text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Preset {
    #[default]
    Default,
    Aggressive,
    Conservative,
}

impl Preset {
    pub fn policy(self) -> RetryPolicy {
        match self {
            Preset::Default => RetryPolicy::default(),
            Preset::Aggressive => RetryPolicy::aggressive(),
            Preset::Conservative => RetryPolicy::conservative(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Aggressive => "aggressive",
            Preset::Conservative => "conservative",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Preset::Default),
            "aggressive" => Ok(Preset::Aggressive),
            "conservative" => Ok(Preset::Conservative),
            _ => Err(PolicyError::UnknownPreset(s.to_string())),
        }
    }
}

impl From<Preset> for RetryPolicy {
    fn from(preset: Preset) -> Self {
        preset.policy()
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    //! Config-file form: either a preset name or an explicit table.
    //!
    //! ```toml
    //! retry = "aggressive"
    //! # or
    //! retry = { max_attempts = 4, initial_delay_ms = 250, max_delay_ms = 8000, multiplier = 1.5 }
    //! ```
    //! Omitted table fields fall back to the default preset.

    use super::{Preset, RetryPolicy};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PolicyRepr {
        Preset(String),
        Table(PolicyTable),
    }

    #[derive(Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct PolicyTable {
        max_attempts: Option<u32>,
        initial_delay_ms: Option<u64>,
        max_delay_ms: Option<u64>,
        multiplier: Option<f64>,
    }

    impl<'de> Deserialize<'de> for RetryPolicy {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            match PolicyRepr::deserialize(deserializer)? {
                PolicyRepr::Preset(name) => {
                    name.parse::<Preset>().map(Preset::policy).map_err(serde::de::Error::custom)
                }
                PolicyRepr::Table(table) => {
                    let mut builder = RetryPolicy::builder();
                    if let Some(n) = table.max_attempts {
                        builder = builder.max_attempts(n);
                    }
                    if let Some(ms) = table.initial_delay_ms {
                        builder = builder.initial_delay(Duration::from_millis(ms));
                    }
                    if let Some(ms) = table.max_delay_ms {
                        builder = builder.max_delay(Duration::from_millis(ms));
                    }
                    if let Some(m) = table.multiplier {
                        builder = builder.multiplier(m);
                    }
                    builder.build().map_err(serde::de::Error::custom)
                }
            }
        }
    }

    impl Serialize for RetryPolicy {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            PolicyTable {
                max_attempts: Some(self.max_attempts),
                initial_delay_ms: Some(saturating_millis(self.initial_delay)),
                max_delay_ms: Some(saturating_millis(self.max_delay)),
                multiplier: Some(self.multiplier),
            }
            .serialize(serializer)
        }
    }

    fn saturating_millis(d: Duration) -> u64 {
        u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_values() {
        let d = RetryPolicy::default();
        assert_eq!(d.max_attempts(), 3);
        assert_eq!(d.initial_delay(), Duration::from_secs(1));
        assert_eq!(d.max_delay(), Duration::from_secs(10));
        assert_eq!(d.multiplier(), 2.0);

        let a = RetryPolicy::aggressive();
        assert_eq!(a.max_attempts(), 5);
        assert_eq!(a.initial_delay(), Duration::from_millis(500));
        assert_eq!(a.max_delay(), Duration::from_secs(15));
        assert_eq!(a.multiplier(), 2.0);
    }

    #[test]
    fn conservative_aliases_default() {
        assert_eq!(RetryPolicy::conservative(), RetryPolicy::default());
        assert_ne!(Preset::Conservative, Preset::Default);
    }

    #[test]
    fn builder_rejects_zero_attempts() {
        let err = RetryPolicy::builder().max_attempts(0).build();
        assert_eq!(err, Err(PolicyError::ZeroAttempts));
    }

    #[test]
    fn builder_rejects_max_below_initial() {
        let err = RetryPolicy::builder()
            .initial_delay(Duration::from_secs(5))
            .max_delay(Duration::from_secs(1))
            .build();
        assert!(matches!(err, Err(PolicyError::MaxBelowInitial { .. })));
    }

    #[test]
    fn builder_rejects_bad_multiplier() {
        assert!(matches!(
            RetryPolicy::builder().multiplier(0.5).build(),
            Err(PolicyError::InvalidMultiplier(_))
        ));
        assert!(RetryPolicy::builder().multiplier(f64::NAN).build().is_err());
        assert!(RetryPolicy::builder().multiplier(f64::INFINITY).build().is_err());
    }

    #[test]
    fn builder_accepts_edges() {
        let p = RetryPolicy::builder()
            .max_attempts(1)
            .initial_delay(Duration::ZERO)
            .max_delay(Duration::ZERO)
            .multiplier(1.0)
            .build()
            .unwrap();
        assert_eq!(p.max_attempts(), 1);
    }

    #[test]
    fn to_builder_round_trips() {
        let p = RetryPolicy::aggressive().to_builder().max_attempts(9).build().unwrap();
        assert_eq!(p.max_attempts(), 9);
        assert_eq!(p.max_delay(), Duration::from_secs(15));
    }

    #[test]
    fn preset_parsing() {
        assert_eq!(" Aggressive ".parse::<Preset>().unwrap(), Preset::Aggressive);
        assert_eq!("conservative".parse::<Preset>().unwrap().policy(), RetryPolicy::default());
        assert_eq!(
            "fast".parse::<Preset>(),
            Err(PolicyError::UnknownPreset("fast".to_string()))
        );
        assert_eq!(Preset::Default.to_string(), "default");
    }
}
