//! Error types for the retry coordinator.
//!
//! The coordinator never invents an error of its own for a failed operation: a
//! terminal failure is the operation's last error, carried unchanged inside
//! [`RetryError::Operation`] next to the attempt count and the classification
//! that ended the loop. Cancellation is the only condition the coordinator
//! reports on its own, and it is kept distinct from operation failures.

use crate::classify::ErrorClass;
use std::time::Duration;

/// Outcome of a retried operation: the success value or a [`RetryError`].
pub type RetryOutcome<T, E> = Result<T, RetryError<E>>;

/// Terminal failure of a retried operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetryError<E> {
    /// The operation failed and was not retried again, either because the
    /// error was not retryable or because the attempt budget ran out.
    #[error("operation failed after {attempts} attempt(s) ({class}): {source}")]
    Operation {
        /// Attempts made, including the one that produced `source`.
        attempts: u32,
        /// How the final error was classified.
        class: ErrorClass,
        /// The most recent error returned by the operation.
        source: E,
    },
    /// The run was cancelled before the operation could be attempted again.
    #[error("retry cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Attempts that had completed when cancellation was observed.
        attempts: u32,
    },
}

impl<E> RetryError<E> {
    /// Check if the run ended because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Number of attempts made before the run ended.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Operation { attempts, .. } | Self::Cancelled { attempts } => *attempts,
        }
    }

    /// Classification of the final operation error, if any.
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            Self::Operation { class, .. } => Some(*class),
            Self::Cancelled { .. } => None,
        }
    }

    /// Borrow the operation's last error.
    pub fn as_operation(&self) -> Option<&E> {
        match self {
            Self::Operation { source, .. } => Some(source),
            Self::Cancelled { .. } => None,
        }
    }

    /// Take the operation's last error, dropping the retry metadata.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation { source, .. } => Some(source),
            Self::Cancelled { .. } => None,
        }
    }
}

/// Errors produced while building policies and jitter configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    /// `max_attempts` must be at least 1.
    #[error("max_attempts must be >= 1")]
    ZeroAttempts,
    /// `max_delay` must not be smaller than `initial_delay`.
    #[error("max_delay ({max:?}) must be >= initial_delay ({initial:?})")]
    MaxBelowInitial { initial: Duration, max: Duration },
    /// Multiplier must be finite and at least 1.0.
    #[error("multiplier must be finite and >= 1.0 (got {0})")]
    InvalidMultiplier(f64),
    /// Jitter bounds must be finite with `0 <= low <= high`.
    #[error("jitter bounds must satisfy 0 <= low <= high (got {low}..={high})")]
    InvalidJitter { low: f64, high: f64 },
    /// Preset name did not match any known preset.
    #[error("unknown retry preset `{0}`")]
    UnknownPreset(String),
}
