#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # secondwind
//!
//! Retry coordinator for fallible async operations.
//!
//! ## Features
//!
//! - **Retry policies** with three named presets and a validating builder
//! - **Error classification** into transient, non-retryable and unknown
//!   failures from structured error categories
//! - **Exponential backoff** with proportional jitter, capped per policy
//! - **Cancellation** checked before every attempt and raced against every delay
//! - **Observer hooks** (`tracing` by default) that never affect outcomes
//! - **Tower layer** and a live-updatable policy handle
//!
//! ## Quick Start
//!
//! ```rust
//! use secondwind::{Preset, RetryCoordinator};
//! use secondwind::classify::{OperationError, TransportSignal};
//!
//! #[tokio::main]
//! async fn main() {
//!     let coordinator = RetryCoordinator::new();
//!     let policy = Preset::Aggressive.policy();
//!
//!     let result = coordinator
//!         .run(&policy, || async {
//!             // Your async operation here
//!             Ok::<_, OperationError>(())
//!         })
//!         .await;
//!     assert!(result.is_ok());
//!
//!     let err = coordinator
//!         .run(&policy, || async {
//!             Err::<(), _>(OperationError::transport(TransportSignal::Other, "bad frame"))
//!         })
//!         .await
//!         .unwrap_err();
//!     // unknown failures are not retried
//!     assert_eq!(err.attempts(), 1);
//! }
//! ```

pub mod backoff;
pub mod cancel;
pub mod category;
pub mod classify;
pub mod coordinator;
pub mod dynamic;
pub mod error;
pub mod layer;
pub mod observer;
pub mod policy;
pub mod prelude;
pub mod sleeper;

// Re-exports
pub use backoff::{Backoff, Jitter, ProportionalRange};
pub use cancel::{CancelSource, CancelToken};
pub use category::{OperationCategory, UnknownCategory};
pub use classify::{
    Categorized, Classify, ErrorCategory, ErrorClass, OperationError, StandardClassifier,
};
pub use coordinator::{RetryCoordinator, RetryCoordinatorBuilder};
pub use dynamic::DynamicPolicy;
pub use error::{PolicyError, RetryError, RetryOutcome};
pub use layer::{RetryLayer, RetryService};
pub use observer::{
    AttemptContext, FanoutObserver, NoopObserver, RecordingObserver, RetryEvent, RetryObserver,
    TracingObserver,
};
pub use policy::{Preset, RetryPolicy, RetryPolicyBuilder};
pub use sleeper::{InstantSleeper, RecordingSleeper, Sleeper, TokioSleeper};
