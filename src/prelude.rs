//! Convenient re-exports for common secondwind types.
pub use crate::{
    cancel::{CancelSource, CancelToken},
    category::OperationCategory,
    classify::{Categorized, Classify, ErrorCategory, ErrorClass, OperationError},
    coordinator::RetryCoordinator,
    dynamic::DynamicPolicy,
    error::{RetryError, RetryOutcome},
    layer::RetryLayer,
    observer::{RetryObserver, TracingObserver},
    policy::{Preset, RetryPolicy},
    sleeper::{InstantSleeper, Sleeper, TokioSleeper},
};
