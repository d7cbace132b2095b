//! Cancellation signal for retry runs.
//!
//! A [`CancelSource`] owns the signal; any number of [`CancelToken`]s observe
//! it. Built on `tokio::sync::watch`, so waiting for cancellation is a plain
//! await with no polling.
//!
//! Dropping every `CancelToken` is harmless. Dropping the `CancelSource`
//! without cancelling means the tokens never fire.

use tokio::sync::watch;

/// Owner side of a cancellation signal.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// A token observing this source.
    pub fn token(&self) -> CancelToken {
        CancelToken { rx: self.tx.subscribe() }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a cancellation signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is signalled; pends forever if the source
    /// is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // source gone; the value can no longer change
                if *rx.borrow() {
                    return;
                }
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn token_observes_cancel() {
        let source = CancelSource::new();
        let token = source.token();
        assert!(!token.is_cancelled());
        source.cancel();
        assert!(token.is_cancelled());
        assert!(source.is_cancelled());
        token.cancelled().await;
    }

    #[tokio::test]
    async fn cancelled_wakes_waiter() {
        let source = CancelSource::new();
        let token = source.token();
        let waiter = tokio::spawn(async move { token.cancelled().await });
        tokio::task::yield_now().await;
        source.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .expect("task ok");
    }

    #[tokio::test]
    async fn cancel_before_source_drop_is_kept() {
        let source = CancelSource::new();
        let token = source.token();
        source.cancel();
        drop(source);
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already cancelled");
    }

    #[tokio::test(start_paused = true)]
    async fn never_token_pends() {
        let token = CancelToken::never();
        let res = tokio::time::timeout(Duration::from_secs(60), token.cancelled()).await;
        assert!(res.is_err());
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let source = CancelSource::default();
        let a = source.token();
        let b = a.clone();
        source.cancel();
        source.cancel();
        a.cancelled().await;
        b.cancelled().await;
    }
}
