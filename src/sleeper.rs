//! Delay primitive used between attempts.
//!
//! The coordinator never calls `tokio::time::sleep` directly; it asks a
//! [`Sleeper`] for a future and races it against cancellation. Tests swap in
//! [`InstantSleeper`] or [`RecordingSleeper`] to run retry loops without
//! waiting.

use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Produces the future the coordinator awaits between attempts.
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Completes immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantSleeper;

impl Sleeper for InstantSleeper {
    fn sleep(&self, _duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }
}

/// Completes immediately and remembers every requested delay.
///
/// Clones share the same record, so a clone can be handed to the coordinator
/// and the original inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.delays.lock().map(|d| d.len()).unwrap_or(0)
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
        Box::pin(async {})
    }
}
