//! Cooperative cancellation for long-running waits.
//!
//! A [`CancelSource`] is held by whoever owns the operation (typically UI
//! code reacting to a user abort); the [`CancelToken`] side is observed by
//! the wait itself. Cancelling is edge-triggered and sticky: once fired,
//! every clone of the token reports cancelled forever.

use tokio::sync::watch;

/// Cancellation authority handed to the owner of a wait.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

/// Token observed by the waiting side.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelSource {
    /// Creates a source and its first token.
    pub fn new() -> (CancelSource, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelSource { tx }, CancelToken { rx })
    }

    /// Signals every outstanding token.
    pub fn cancel(&self) {
        // All tokens may already be gone; that is fine.
        let _ = self.tx.send(true);
    }
}

impl CancelToken {
    /// A token that never fires, for waits bounded by their timeout alone.
    pub fn never() -> CancelToken {
        let (_tx, rx) = watch::channel(false);
        CancelToken { rx }
    }

    /// Whether the source has already cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes when the source cancels. If the source is dropped without
    /// cancelling, this pends forever; callers race it against a deadline.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Source dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }
}
