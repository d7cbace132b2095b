//! Observation hooks for retry runs.
//!
//! The coordinator reports what it does through a [`RetryObserver`]; the loop
//! itself contains no logging. Hooks are synchronous and informational: their
//! return values are ignored and they cannot change an outcome. Anything slow
//! should be handed off (channel, spawned task) rather than done inline.
//!
//! Provided observers:
//! - [`TracingObserver`]: structured `tracing` events (the coordinator default).
//! - [`RecordingObserver`]: keeps [`RetryEvent`]s in memory for assertions.
//! - [`NoopObserver`]: discards everything.
//! - [`FanoutObserver`]: forwards to several observers.

use crate::classify::ErrorClass;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptContext<'a> {
    /// Caller-supplied label (`"network"`, `"upload"`, ...).
    pub label: &'a str,
    /// 1-based attempt index.
    pub attempt: u32,
    pub max_attempts: u32,
}

/// Hook invoked by the coordinator. Every method defaults to a no-op.
pub trait RetryObserver: Send + Sync {
    /// An attempt is about to invoke the operation.
    fn on_attempt_start(&self, _ctx: &AttemptContext<'_>) {}

    /// An attempt failed. `next_delay` is `Some` when another attempt will
    /// follow after that delay, `None` when the run ends with this error.
    fn on_attempt_failure(
        &self,
        _ctx: &AttemptContext<'_>,
        _class: ErrorClass,
        _error: &dyn fmt::Display,
        _next_delay: Option<Duration>,
    ) {
    }

    /// The operation succeeded on `ctx.attempt`.
    fn on_success(&self, _ctx: &AttemptContext<'_>) {}

    /// Every attempt failed with retryable errors.
    fn on_exhausted(&self, _ctx: &AttemptContext<'_>) {}

    /// Cancellation stopped the run after `ctx.attempt` attempts.
    fn on_cancelled(&self, _ctx: &AttemptContext<'_>) {}
}

impl<O: RetryObserver + ?Sized> RetryObserver for Arc<O> {
    fn on_attempt_start(&self, ctx: &AttemptContext<'_>) {
        (**self).on_attempt_start(ctx)
    }

    fn on_attempt_failure(
        &self,
        ctx: &AttemptContext<'_>,
        class: ErrorClass,
        error: &dyn fmt::Display,
        next_delay: Option<Duration>,
    ) {
        (**self).on_attempt_failure(ctx, class, error, next_delay)
    }

    fn on_success(&self, ctx: &AttemptContext<'_>) {
        (**self).on_success(ctx)
    }

    fn on_exhausted(&self, ctx: &AttemptContext<'_>) {
        (**self).on_exhausted(ctx)
    }

    fn on_cancelled(&self, ctx: &AttemptContext<'_>) {
        (**self).on_cancelled(ctx)
    }
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RetryObserver for NoopObserver {}

/// Emits `tracing` events under the `secondwind::retry` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, ctx: &AttemptContext<'_>) {
        tracing::trace!(
            target: "secondwind::retry",
            label = ctx.label,
            attempt = ctx.attempt,
            max_attempts = ctx.max_attempts,
            "attempt starting"
        );
    }

    fn on_attempt_failure(
        &self,
        ctx: &AttemptContext<'_>,
        class: ErrorClass,
        error: &dyn fmt::Display,
        next_delay: Option<Duration>,
    ) {
        match next_delay {
            Some(delay) => tracing::warn!(
                target: "secondwind::retry",
                label = ctx.label,
                attempt = ctx.attempt,
                max_attempts = ctx.max_attempts,
                class = %class,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "attempt failed, retrying"
            ),
            None => tracing::error!(
                target: "secondwind::retry",
                label = ctx.label,
                attempt = ctx.attempt,
                max_attempts = ctx.max_attempts,
                class = %class,
                error = %error,
                "attempt failed"
            ),
        }
    }

    fn on_success(&self, ctx: &AttemptContext<'_>) {
        if ctx.attempt > 1 {
            tracing::info!(
                target: "secondwind::retry",
                label = ctx.label,
                attempts = ctx.attempt,
                "operation succeeded after {} attempts",
                ctx.attempt
            );
        } else {
            tracing::debug!(target: "secondwind::retry", label = ctx.label, "operation succeeded");
        }
    }

    fn on_exhausted(&self, ctx: &AttemptContext<'_>) {
        tracing::error!(
            target: "secondwind::retry",
            label = ctx.label,
            attempts = ctx.attempt,
            "retry attempts exhausted"
        );
    }

    fn on_cancelled(&self, ctx: &AttemptContext<'_>) {
        tracing::info!(
            target: "secondwind::retry",
            label = ctx.label,
            attempts = ctx.attempt,
            "retry cancelled"
        );
    }
}

/// Owned record of one observer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryEvent {
    AttemptStarted { label: String, attempt: u32 },
    AttemptFailed {
        label: String,
        attempt: u32,
        class: ErrorClass,
        error: String,
        next_delay: Option<Duration>,
    },
    Succeeded { label: String, attempt: u32 },
    Exhausted { label: String, attempts: u32 },
    Cancelled { label: String, attempts: u32 },
}

impl fmt::Display for RetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryEvent::AttemptStarted { label, attempt } => {
                write!(f, "{}: attempt #{} started", label, attempt)
            }
            RetryEvent::AttemptFailed { label, attempt, class, error, next_delay } => {
                write!(f, "{}: attempt #{} failed ({}): {}", label, attempt, class, error)?;
                if let Some(delay) = next_delay {
                    write!(f, ", retrying in {:?}", delay)?;
                }
                Ok(())
            }
            RetryEvent::Succeeded { label, attempt } => {
                write!(f, "{}: succeeded on attempt #{}", label, attempt)
            }
            RetryEvent::Exhausted { label, attempts } => {
                write!(f, "{}: exhausted after {} attempts", label, attempts)
            }
            RetryEvent::Cancelled { label, attempts } => {
                write!(f, "{}: cancelled after {} attempts", label, attempts)
            }
        }
    }
}

/// Stores events in memory, evicting the oldest once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct RecordingObserver {
    events: Arc<Mutex<VecDeque<RetryEvent>>>,
    capacity: usize,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::with_capacity(1_024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { events: Arc::new(Mutex::new(VecDeque::new())), capacity: capacity.max(1) }
    }

    pub fn events(&self) -> Vec<RetryEvent> {
        self.events.lock().map(|e| e.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    /// Delays announced by retryable failures, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RetryEvent::AttemptFailed { next_delay, .. } => next_delay,
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: RetryEvent) {
        if let Ok(mut events) = self.events.lock() {
            if events.len() >= self.capacity {
                events.pop_front();
            }
            events.push_back(event);
        }
    }
}

impl Default for RecordingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryObserver for RecordingObserver {
    fn on_attempt_start(&self, ctx: &AttemptContext<'_>) {
        self.push(RetryEvent::AttemptStarted { label: ctx.label.to_string(), attempt: ctx.attempt });
    }

    fn on_attempt_failure(
        &self,
        ctx: &AttemptContext<'_>,
        class: ErrorClass,
        error: &dyn fmt::Display,
        next_delay: Option<Duration>,
    ) {
        self.push(RetryEvent::AttemptFailed {
            label: ctx.label.to_string(),
            attempt: ctx.attempt,
            class,
            error: error.to_string(),
            next_delay,
        });
    }

    fn on_success(&self, ctx: &AttemptContext<'_>) {
        self.push(RetryEvent::Succeeded { label: ctx.label.to_string(), attempt: ctx.attempt });
    }

    fn on_exhausted(&self, ctx: &AttemptContext<'_>) {
        self.push(RetryEvent::Exhausted { label: ctx.label.to_string(), attempts: ctx.attempt });
    }

    fn on_cancelled(&self, ctx: &AttemptContext<'_>) {
        self.push(RetryEvent::Cancelled { label: ctx.label.to_string(), attempts: ctx.attempt });
    }
}

/// Forwards every callback to each inner observer, in order.
#[derive(Clone, Default)]
pub struct FanoutObserver {
    observers: Vec<Arc<dyn RetryObserver>>,
}

impl FanoutObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<O: RetryObserver + 'static>(mut self, observer: O) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }
}

impl fmt::Debug for FanoutObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutObserver").field("observers", &self.observers.len()).finish()
    }
}

impl RetryObserver for FanoutObserver {
    fn on_attempt_start(&self, ctx: &AttemptContext<'_>) {
        self.observers.iter().for_each(|o| o.on_attempt_start(ctx));
    }

    fn on_attempt_failure(
        &self,
        ctx: &AttemptContext<'_>,
        class: ErrorClass,
        error: &dyn fmt::Display,
        next_delay: Option<Duration>,
    ) {
        self.observers.iter().for_each(|o| o.on_attempt_failure(ctx, class, error, next_delay));
    }

    fn on_success(&self, ctx: &AttemptContext<'_>) {
        self.observers.iter().for_each(|o| o.on_success(ctx));
    }

    fn on_exhausted(&self, ctx: &AttemptContext<'_>) {
        self.observers.iter().for_each(|o| o.on_exhausted(ctx));
    }

    fn on_cancelled(&self, ctx: &AttemptContext<'_>) {
        self.observers.iter().for_each(|o| o.on_cancelled(ctx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(attempt: u32) -> AttemptContext<'static> {
        AttemptContext { label: "test", attempt, max_attempts: 3 }
    }

    #[test]
    fn recording_observer_keeps_order() {
        let obs = RecordingObserver::new();
        obs.on_attempt_start(&ctx(1));
        obs.on_attempt_failure(
            &ctx(1),
            ErrorClass::TransientRetryable,
            &"boom",
            Some(Duration::from_millis(900)),
        );
        obs.on_attempt_start(&ctx(2));
        obs.on_success(&ctx(2));

        let events = obs.events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], RetryEvent::AttemptStarted { label: "test".into(), attempt: 1 });
        assert_eq!(events[3], RetryEvent::Succeeded { label: "test".into(), attempt: 2 });
        assert_eq!(obs.delays(), vec![Duration::from_millis(900)]);
    }

    #[test]
    fn recording_observer_evicts_oldest() {
        let obs = RecordingObserver::with_capacity(2);
        obs.on_attempt_start(&ctx(1));
        obs.on_attempt_start(&ctx(2));
        obs.on_attempt_start(&ctx(3));
        let events = obs.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], RetryEvent::AttemptStarted { label: "test".into(), attempt: 2 });
        obs.clear();
        assert!(obs.events().is_empty());
    }

    #[test]
    fn full_recorder_keeps_the_newest_events() {
        let obs = RecordingObserver::with_capacity(3);
        for attempt in 1..=10 {
            obs.on_attempt_start(&ctx(attempt));
        }
        let attempts: Vec<u32> = obs
            .events()
            .into_iter()
            .map(|e| match e {
                RetryEvent::AttemptStarted { attempt, .. } => attempt,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(attempts, vec![8, 9, 10]);
    }

    #[test]
    fn fanout_reaches_every_observer() {
        let a = RecordingObserver::new();
        let b = RecordingObserver::new();
        let fanout = FanoutObserver::new().with(a.clone()).with(b.clone()).with(NoopObserver);
        fanout.on_exhausted(&ctx(3));
        assert_eq!(a.events(), vec![RetryEvent::Exhausted { label: "test".into(), attempts: 3 }]);
        assert_eq!(a.events(), b.events());
    }

    #[test]
    fn event_display() {
        let failed = RetryEvent::AttemptFailed {
            label: "network".into(),
            attempt: 1,
            class: ErrorClass::TransientRetryable,
            error: "timed out".into(),
            next_delay: Some(Duration::from_millis(500)),
        };
        let text = failed.to_string();
        assert!(text.starts_with("network: attempt #1 failed (transient)"));
        assert!(text.contains("retrying in 500ms"));
        assert_eq!(
            RetryEvent::Cancelled { label: "upload".into(), attempts: 2 }.to_string(),
            "upload: cancelled after 2 attempts"
        );
    }

    #[test]
    fn tracing_observer_emits_without_subscriber() {
        let obs = TracingObserver;
        obs.on_attempt_start(&ctx(1));
        obs.on_attempt_failure(&ctx(1), ErrorClass::Unknown, &"weird", None);
        obs.on_success(&ctx(2));
        obs.on_exhausted(&ctx(3));
        obs.on_cancelled(&ctx(1));
    }
}
