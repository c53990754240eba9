//! Mount-scoped cancellation
//!
//! Every suspension point of a chat surface (completion call, pacing timers,
//! speech fetch) runs through a [`Lifetime`]. Cancelling it resolves all of
//! them with [`AssistantError::Cancelled`], so nothing started by one mount
//! can land on the next one.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{AssistantError, AssistantResult};

#[derive(Debug, Clone)]
pub struct Lifetime {
    cancelled: Arc<watch::Sender<bool>>,
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifetime {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            cancelled: Arc::new(tx),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.subscribe();
        loop {
            let done = *rx.borrow_and_update();
            if done {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender lives as long as `self`; unreachable in practice.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `fut` unless the lifetime ends first
    pub async fn run<F>(&self, fut: F) -> AssistantResult<F::Output>
    where
        F: Future,
    {
        if self.is_cancelled() {
            return Err(AssistantError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(AssistantError::Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Cancellable delay; a zero delay only checks for cancellation
    pub async fn sleep(&self, delay: Duration) -> AssistantResult<()> {
        if delay.is_zero() {
            return if self.is_cancelled() {
                Err(AssistantError::Cancelled)
            } else {
                Ok(())
            };
        }
        self.run(tokio::time::sleep(delay)).await
    }
}
