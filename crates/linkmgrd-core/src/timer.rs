//! Cancellable deadline timers (§4.2 suspend timer, §4.5 switchover
//! back-off, §6 warm-restart reconciliation timeout).
//!
//! Every timer in the port state machines needs the same shape: fire a
//! completion handler after a deadline, but let the strand cancel it early
//! and still be told definitively whether it fired or was cancelled. This
//! wraps `tokio::time::sleep` with a cancel signal to give that shape
//! without requiring the caller to juggle `tokio::select!` at every call
//! site.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Outcome of a [`Cancellable`] timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    Expired,
    Cancelled,
}

/// A single in-flight deadline timer. Dropping the handle without calling
/// [`Cancellable::cancel`] lets the timer run to completion in the
/// background; the completion handler still runs exactly once either way.
pub struct Cancellable {
    cancel_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Cancellable {
    /// Spawn a timer that calls `on_complete` with [`TimerOutcome::Expired`]
    /// after `duration`, or with [`TimerOutcome::Cancelled`] as soon as
    /// [`cancel`](Self::cancel) is called.
    pub fn spawn<F>(duration: Duration, on_complete: F) -> Self
    where
        F: FnOnce(TimerOutcome) + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => on_complete(TimerOutcome::Expired),
                _ = cancel_rx => on_complete(TimerOutcome::Cancelled),
            }
        });
        Self {
            cancel_tx: Some(cancel_tx),
            task,
        }
    }

    /// Request cancellation. Idempotent: calling this after the timer has
    /// already fired (or already been cancelled) is a harmless no-op,
    /// satisfying the "must behave idempotently on late cancel" requirement
    /// (§4.2, §8 invariant 5).
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the completion handler's spawned task to finish, mostly
    /// useful in tests.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

impl Drop for Cancellable {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn fires_expired_after_deadline() {
        let outcome = Arc::new(AtomicU8::new(0));
        let o = outcome.clone();
        let timer = Cancellable::spawn(Duration::from_millis(10), move |res| {
            o.store(if res == TimerOutcome::Expired { 1 } else { 2 }, Ordering::SeqCst);
        });
        timer.join().await;
        assert_eq!(outcome.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_before_deadline_reports_cancelled() {
        let outcome = Arc::new(AtomicU8::new(0));
        let o = outcome.clone();
        let mut timer = Cancellable::spawn(Duration::from_secs(10), move |res| {
            o.store(if res == TimerOutcome::Expired { 1 } else { 2 }, Ordering::SeqCst);
        });
        timer.cancel();
        timer.join().await;
        assert_eq!(outcome.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn late_cancel_after_expiry_is_a_no_op() {
        let outcome = Arc::new(AtomicU8::new(0));
        let o = outcome.clone();
        let mut timer = Cancellable::spawn(Duration::from_millis(5), move |res| {
            o.store(if res == TimerOutcome::Expired { 1 } else { 2 }, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        timer.cancel();
        assert_eq!(outcome.load(Ordering::SeqCst), 1);
    }
}
