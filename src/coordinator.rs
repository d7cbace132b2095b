//! Retry coordinator.
//!
//! Semantics:
//! - `max_attempts` counts total attempts (initial call + retries).
//! - After a failure the error is classified. Anything other than
//!   [`ErrorClass::TransientRetryable`](crate::classify::ErrorClass::TransientRetryable) ends the run on that attempt,
//!   regardless of remaining budget.
//! - A retryable failure with budget left sleeps for
//!   `Backoff::next_delay(current_delay)`, then `current_delay` grows by the
//!   policy multiplier (capped at `max_delay`) and the next attempt starts.
//! - The terminal error is always the most recent one, never an aggregate.
//! - Cancellation is checked before every attempt and after every retryable
//!   failure, and raced against every sleep. A cancelled run reports [`RetryError::Cancelled`] and never calls
//!   the operation again. An attempt already in flight is not interrupted.
//!
//! Invariants:
//! - Attempts never exceed `max_attempts`.
//! - Every delay handed to the sleeper is within `[0, max_delay]`.
//! - Observer callbacks never influence the outcome.
//!
//! ```rust
//! use secondwind::{InstantSleeper, RetryCoordinator, RetryPolicy};
//! use secondwind::classify::{OperationError, ServiceCode};
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let coordinator = RetryCoordinator::builder().sleeper(InstantSleeper).build();
//! let calls = AtomicU32::new(0);
//! let result = coordinator
//!     .run(&RetryPolicy::default(), || async {
//!         if calls.fetch_add(1, Ordering::SeqCst) == 0 {
//!             Err(OperationError::service(ServiceCode::Unavailable, "warming up"))
//!         } else {
//!             Ok("ready")
//!         }
//!     })
//!     .await;
//! assert_eq!(result.unwrap(), "ready");
//! assert_eq!(calls.load(Ordering::SeqCst), 2);
//! # });
//! ```

use crate::backoff::{Backoff, Jitter};
use crate::cancel::CancelToken;
use crate::classify::{Classify, StandardClassifier};
use crate::error::{RetryError, RetryOutcome};
use crate::observer::{AttemptContext, RetryObserver, TracingObserver};
use crate::policy::RetryPolicy;
use crate::sleeper::{Sleeper, TokioSleeper};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Label used by [`RetryCoordinator::run`] and [`RetryCoordinator::run_cancellable`].
pub const DEFAULT_LABEL: &str = "operation";

/// Runs fallible async operations under a [`RetryPolicy`].
///
/// Holds no per-run state; clone it or share it by reference across tasks.
pub struct RetryCoordinator<C = StandardClassifier> {
    classifier: Arc<C>,
    backoff: Backoff,
    sleeper: Arc<dyn Sleeper>,
    observer: Arc<dyn RetryObserver>,
}

impl<C> Clone for RetryCoordinator<C> {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
            backoff: self.backoff,
            sleeper: self.sleeper.clone(),
            observer: self.observer.clone(),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for RetryCoordinator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryCoordinator")
            .field("classifier", &self.classifier)
            .field("backoff", &self.backoff)
            .field("sleeper", &self.sleeper)
            .field("observer", &"<observer>")
            .finish()
    }
}

impl RetryCoordinator<StandardClassifier> {
    /// Standard classifier, standard jitter, tokio timer, tracing observer.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> RetryCoordinatorBuilder<StandardClassifier> {
        RetryCoordinatorBuilder::new()
    }
}

impl Default for RetryCoordinator<StandardClassifier> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> RetryCoordinator<C> {
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Run `operation` until it succeeds, fails non-retryably, or exhausts
    /// the policy's attempts.
    pub async fn run<T, E, Op, Fut>(&self, policy: &RetryPolicy, operation: Op) -> RetryOutcome<T, E>
    where
        C: Classify<E>,
        E: fmt::Display,
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_labeled(DEFAULT_LABEL, policy, &CancelToken::never(), operation).await
    }

    /// Like [`run`](Self::run), stopping early once `cancel` fires.
    pub async fn run_cancellable<T, E, Op, Fut>(
        &self,
        policy: &RetryPolicy,
        cancel: &CancelToken,
        operation: Op,
    ) -> RetryOutcome<T, E>
    where
        C: Classify<E>,
        E: fmt::Display,
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_labeled(DEFAULT_LABEL, policy, cancel, operation).await
    }

    /// Full form: `label` is passed through to observer callbacks.
    pub async fn run_labeled<T, E, Op, Fut>(
        &self,
        label: &str,
        policy: &RetryPolicy,
        cancel: &CancelToken,
        mut operation: Op,
    ) -> RetryOutcome<T, E>
    where
        C: Classify<E>,
        E: fmt::Display,
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = policy.max_attempts();
        let mut attempt: u32 = 1;
        let mut current_delay = policy.initial_delay();

        loop {
            if cancel.is_cancelled() {
                return Err(self.cancelled(label, attempt - 1, max_attempts));
            }

            let ctx = AttemptContext { label, attempt, max_attempts };
            self.observer.on_attempt_start(&ctx);

            let error = match operation().await {
                Ok(value) => {
                    self.observer.on_success(&ctx);
                    return Ok(value);
                }
                Err(error) => error,
            };

            let class = self.classifier.as_ref().classify(&error);
            if !class.is_retryable() || attempt >= max_attempts {
                self.observer.on_attempt_failure(&ctx, class, &error, None);
                if class.is_retryable() {
                    self.observer.on_exhausted(&ctx);
                }
                return Err(RetryError::Operation { attempts: attempt, class, source: error });
            }

            if cancel.is_cancelled() {
                // cancelled while the attempt ran; no retry will follow
                self.observer.on_attempt_failure(&ctx, class, &error, None);
                return Err(self.cancelled(label, attempt, max_attempts));
            }

            let delay = self.backoff.next_delay(current_delay, policy);
            self.observer.on_attempt_failure(&ctx, class, &error, Some(delay));

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(self.cancelled(label, attempt, max_attempts));
                }
                _ = self.sleeper.sleep(delay) => {}
            }

            current_delay = self.backoff.grow(current_delay, policy);
            attempt += 1;
        }
    }

    fn cancelled<E>(&self, label: &str, attempts: u32, max_attempts: u32) -> RetryError<E> {
        self.observer.on_cancelled(&AttemptContext { label, attempt: attempts, max_attempts });
        RetryError::Cancelled { attempts }
    }

    /// Callback form for callers that cannot await.
    ///
    /// Spawns the run on `runtime` and hands the outcome to `callback` exactly
    /// once. If the task is aborted (or the runtime shuts down) first, the
    /// callback still runs once, with [`RetryError::Cancelled`] carrying the
    /// number of attempts started.
    pub fn spawn_with_callback<T, E, Op, Fut, F>(
        &self,
        runtime: &Handle,
        policy: RetryPolicy,
        cancel: CancelToken,
        mut operation: Op,
        callback: F,
    ) -> JoinHandle<()>
    where
        C: Classify<E> + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        Op: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        F: FnOnce(RetryOutcome<T, E>) + Send + 'static,
    {
        let coordinator = self.clone();
        let started = Arc::new(AtomicU32::new(0));
        let mut guard = CallbackGuard::new(callback, started.clone());

        runtime.spawn(async move {
            let counted = move || {
                started.fetch_add(1, Ordering::Relaxed);
                operation()
            };
            let outcome = coordinator.run_labeled(DEFAULT_LABEL, &policy, &cancel, counted).await;
            guard.complete(outcome);
        })
    }
}

/// Delivers a run's outcome exactly once, falling back to `Cancelled` on drop.
struct CallbackGuard<T, E, F>
where
    F: FnOnce(RetryOutcome<T, E>),
{
    callback: Option<F>,
    started: Arc<AtomicU32>,
    _outcome: PhantomData<fn(RetryOutcome<T, E>)>,
}

impl<T, E, F> CallbackGuard<T, E, F>
where
    F: FnOnce(RetryOutcome<T, E>),
{
    fn new(callback: F, started: Arc<AtomicU32>) -> Self {
        Self { callback: Some(callback), started, _outcome: PhantomData }
    }

    fn complete(&mut self, outcome: RetryOutcome<T, E>) {
        if let Some(callback) = self.callback.take() {
            callback(outcome);
        }
    }
}

impl<T, E, F> Drop for CallbackGuard<T, E, F>
where
    F: FnOnce(RetryOutcome<T, E>),
{
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(Err(RetryError::Cancelled { attempts: self.started.load(Ordering::Relaxed) }));
        }
    }
}

/// Builder for [`RetryCoordinator`].
pub struct RetryCoordinatorBuilder<C> {
    classifier: C,
    jitter: Jitter,
    sleeper: Arc<dyn Sleeper>,
    observer: Arc<dyn RetryObserver>,
}

impl RetryCoordinatorBuilder<StandardClassifier> {
    pub fn new() -> Self {
        Self {
            classifier: StandardClassifier::new(),
            jitter: Jitter::standard(),
            sleeper: Arc::new(TokioSleeper),
            observer: Arc::new(TracingObserver),
        }
    }
}

impl Default for RetryCoordinatorBuilder<StandardClassifier> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> RetryCoordinatorBuilder<C> {
    /// Replace the classifier; any `Classify<E>` implementation (or closure) works.
    pub fn classifier<C2>(self, classifier: C2) -> RetryCoordinatorBuilder<C2> {
        RetryCoordinatorBuilder {
            classifier,
            jitter: self.jitter,
            sleeper: self.sleeper,
            observer: self.observer,
        }
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn observer<O: RetryObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn build(self) -> RetryCoordinator<C> {
        RetryCoordinator {
            classifier: Arc::new(self.classifier),
            backoff: Backoff::new(self.jitter),
            sleeper: self.sleeper,
            observer: self.observer,
        }
    }
}
