//! Live-updatable retry policy.
//!
//! [`DynamicPolicy`] is a shared handle to a [`RetryPolicy`] that can be
//! replaced while runs are using it. Each run takes a snapshot when it starts,
//! so an update affects only runs started afterwards.
//!
//! Backed by `ArcSwap` (lock-free reads) with the default `arc-swap` feature,
//! and by an `RwLock` without it.

use crate::cancel::CancelToken;
use crate::classify::Classify;
use crate::coordinator::{RetryCoordinator, DEFAULT_LABEL};
use crate::error::{PolicyError, RetryOutcome};
use crate::policy::{Preset, RetryPolicy, RetryPolicyBuilder};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

#[cfg(not(feature = "arc-swap"))]
use std::sync::RwLock;

#[cfg(feature = "arc-swap")]
use arc_swap::ArcSwap;

/// Shared, swappable [`RetryPolicy`]. Clones observe the same value.
#[derive(Debug, Clone)]
pub struct DynamicPolicy {
    #[cfg(feature = "arc-swap")]
    inner: Arc<ArcSwap<RetryPolicy>>,
    #[cfg(not(feature = "arc-swap"))]
    inner: Arc<RwLock<RetryPolicy>>,
}

impl DynamicPolicy {
    pub fn new(policy: RetryPolicy) -> Self {
        #[cfg(feature = "arc-swap")]
        {
            Self { inner: Arc::new(ArcSwap::from_pointee(policy)) }
        }
        #[cfg(not(feature = "arc-swap"))]
        {
            Self { inner: Arc::new(RwLock::new(policy)) }
        }
    }

    /// Current policy.
    pub fn get(&self) -> RetryPolicy {
        #[cfg(feature = "arc-swap")]
        {
            **self.inner.load()
        }
        #[cfg(not(feature = "arc-swap"))]
        {
            *self.inner.read().unwrap_or_else(|e| e.into_inner())
        }
    }

    /// Replace the policy.
    pub fn set(&self, policy: RetryPolicy) {
        #[cfg(feature = "arc-swap")]
        {
            self.inner.store(Arc::new(policy));
        }
        #[cfg(not(feature = "arc-swap"))]
        {
            *self.inner.write().unwrap_or_else(|e| e.into_inner()) = policy;
        }
    }

    /// Switch to a named preset.
    pub fn set_preset(&self, preset: Preset) {
        self.set(preset.policy());
    }

    /// Edit the current policy through its builder; the stored policy is left
    /// unchanged if validation fails.
    pub fn update<F>(&self, f: F) -> Result<RetryPolicy, PolicyError>
    where
        F: FnOnce(RetryPolicyBuilder) -> RetryPolicyBuilder,
    {
        let next = f(self.get().to_builder()).build()?;
        self.set(next);
        Ok(next)
    }
}

impl Default for DynamicPolicy {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl From<RetryPolicy> for DynamicPolicy {
    fn from(policy: RetryPolicy) -> Self {
        Self::new(policy)
    }
}

impl<C> RetryCoordinator<C> {
    /// Run under whatever policy `dynamic` holds right now. Later updates do
    /// not affect this run.
    pub async fn run_dynamic<T, E, Op, Fut>(
        &self,
        dynamic: &DynamicPolicy,
        cancel: &CancelToken,
        operation: Op,
    ) -> RetryOutcome<T, E>
    where
        C: Classify<E>,
        E: fmt::Display,
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let policy = dynamic.get();
        self.run_labeled(DEFAULT_LABEL, &policy, cancel, operation).await
    }
}
