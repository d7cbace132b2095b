//! Tower integration.
//!
//! [`RetryLayer`] wraps a `Service` so that every request goes through a
//! [`RetryCoordinator`] run. Requests must be `Clone` since each attempt sends
//! a fresh copy; the inner service is cloned per attempt and driven to
//! readiness before each call.
//!
//! ```rust
//! use secondwind::{InstantSleeper, RetryCoordinator, RetryLayer, RetryPolicy};
//! use secondwind::classify::{OperationError, ServiceCode};
//! use tower::{service_fn, ServiceBuilder, ServiceExt};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let coordinator = RetryCoordinator::builder().sleeper(InstantSleeper).build();
//! let svc = ServiceBuilder::new()
//!     .layer(RetryLayer::new(coordinator, RetryPolicy::default()))
//!     .service(service_fn(|name: &'static str| async move {
//!         Ok::<_, OperationError>(format!("hello {name}"))
//!     }));
//! assert_eq!(svc.oneshot("world").await.unwrap(), "hello world");
//! # });
//! ```

use crate::cancel::CancelToken;
use crate::classify::{Classify, StandardClassifier};
use crate::coordinator::RetryCoordinator;
use crate::error::RetryError;
use crate::policy::RetryPolicy;
use futures::future::BoxFuture;
use std::borrow::Cow;
use std::fmt;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Layer applying a retry policy to an inner service.
pub struct RetryLayer<C = StandardClassifier> {
    coordinator: RetryCoordinator<C>,
    policy: RetryPolicy,
    cancel: CancelToken,
    label: Cow<'static, str>,
}

impl<C> RetryLayer<C> {
    pub fn new(coordinator: RetryCoordinator<C>, policy: RetryPolicy) -> Self {
        Self { coordinator, policy, cancel: CancelToken::never(), label: Cow::Borrowed("service") }
    }

    /// Stop retrying every in-flight request once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Label reported to the coordinator's observer.
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<C> Clone for RetryLayer<C> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            policy: self.policy,
            cancel: self.cancel.clone(),
            label: self.label.clone(),
        }
    }
}

impl<C> fmt::Debug for RetryLayer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryLayer")
            .field("policy", &self.policy)
            .field("label", &self.label)
            .finish()
    }
}

impl<S, C> Layer<S> for RetryLayer<C> {
    type Service = RetryService<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService { inner, layer: self.clone() }
    }
}

/// Service produced by [`RetryLayer`].
pub struct RetryService<S, C = StandardClassifier> {
    inner: S,
    layer: RetryLayer<C>,
}

impl<S: Clone, C> Clone for RetryService<S, C> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), layer: self.layer.clone() }
    }
}

impl<S: fmt::Debug, C> fmt::Debug for RetryService<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryService").field("inner", &self.inner).field("layer", &self.layer).finish()
    }
}

impl<S, C, Request> Service<Request> for RetryService<S, C>
where
    Request: Clone + Send + 'static,
    S: Service<Request> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: fmt::Display + Send + 'static,
    S::Future: Send + 'static,
    C: Classify<S::Error> + 'static,
{
    type Response = S::Response;
    type Error = RetryError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // readiness is awaited per attempt on a clone of the inner service
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let layer = self.layer.clone();
        let inner = self.inner.clone();
        Box::pin(async move {
            let attempt = move || {
                let mut svc = inner.clone();
                let req = req.clone();
                async move {
                    futures::future::poll_fn(|cx| svc.poll_ready(cx)).await?;
                    svc.call(req).await
                }
            };
            layer
                .coordinator
                .run_labeled(&layer.label, &layer.policy, &layer.cancel, attempt)
                .await
        })
    }
}
