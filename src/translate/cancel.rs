use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::{Result, SubtranError};

/// Create a linked handle/signal pair
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// Trigger side of a cancellation pair
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observed at every suspension point of a translation run
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; pends forever if the handle is gone
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `fut` unless cancellation wins first; the future is dropped on cancel
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(SubtranError::Cancelled),
            output = fut => Ok(output),
        }
    }

    /// Cancellable sleep
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            return if self.is_cancelled() { Err(SubtranError::Cancelled) } else { Ok(()) };
        }
        self.guard(tokio::time::sleep(duration)).await
    }
}
