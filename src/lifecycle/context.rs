//! Deadlines and cancellation for health scans and shutdown.
//!
//! A [`Context`] is a value passed down into waits. It carries an optional
//! deadline and any number of [`Shutdown`] signals inherited from its parents.
//! Deriving a child never loosens the parent: the earliest deadline wins and
//! every parent signal still applies.

use std::future::pending;
use std::time::Duration;

use futures_util::future::select_all;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::lifecycle::Shutdown;

/// Why a context stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// A shutdown signal the context listens to was triggered.
    #[error("context canceled")]
    Canceled,

    /// The context's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone, Default)]
pub struct Context {
    signals: Vec<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never canceled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a child that expires `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child that expires at `deadline` (or earlier, if the parent does).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.clone();
        child.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        child
    }

    /// Derive a child that is canceled when `shutdown` is triggered.
    pub fn listening_to(&self, shutdown: &Shutdown) -> Self {
        let mut child = self.clone();
        child.signals.push(shutdown.subscribe());
        child
    }

    /// Derive a child together with the [`Shutdown`] that cancels it.
    pub fn with_shutdown(&self) -> (Self, Shutdown) {
        let shutdown = Shutdown::new();
        (self.listening_to(&shutdown), shutdown)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Some` once the context is done. Cancellation is reported before an
    /// expired deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.signals.iter().any(|rx| *rx.borrow()) {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve when the context is done. Never resolves for a background context.
    pub async fn done(&self) -> ContextError {
        if let Some(err) = self.err() {
            return err;
        }

        let canceled = async {
            if self.signals.is_empty() {
                return pending::<()>().await;
            }
            let waits: Vec<_> = self
                .signals
                .iter()
                .cloned()
                .map(|mut rx| {
                    Box::pin(async move {
                        let closed = rx.wait_for(|fired| *fired).await.is_err();
                        if closed {
                            // Sender dropped without triggering: this signal can no longer fire.
                            pending::<()>().await;
                        }
                    })
                })
                .collect();
            select_all(waits).await;
        };

        let expired = async {
            match self.deadline {
                Some(deadline) => time::sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            _ = canceled => ContextError::Canceled,
            _ = expired => ContextError::DeadlineExceeded,
        }
    }
}
