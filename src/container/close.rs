//! Coordinated shutdown.

use std::mem;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::container::Container;
use crate::lifecycle::{CloseFailure, CloserFailure, Context, ShutdownError};
use crate::observability::metrics;

/// Time budget of [`Container::close`].
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

impl Container {
    /// [`close_with_context`](Self::close_with_context) with a
    /// [`DEFAULT_CLOSE_TIMEOUT`] deadline.
    pub async fn close(&self) -> Result<(), ShutdownError> {
        self.close_with_context(&Context::background().with_timeout(DEFAULT_CLOSE_TIMEOUT))
            .await
    }

    /// Stop the health scheduler, then run every registered closer
    /// concurrently, each raced against `cx`.
    ///
    /// A closer still running when `cx` is done is recorded with the
    /// context's error and keeps running in the background (it is not
    /// aborted, and a later success does not remove the recorded failure).
    /// After the wait the container drops its cached instances, health
    /// checks and configuration, so a second close finds nothing to do.
    pub async fn close_with_context(&self, cx: &Context) -> Result<(), ShutdownError> {
        let (scheduler, closers) = {
            let mut state = self.state.lock();
            (state.scheduler.take(), mem::take(&mut state.closers))
        };

        if let Some(scheduler) = scheduler {
            scheduler.trigger();
        }

        let total = closers.len();
        tracing::info!(closers = total, "Closing container");

        let mut pending: FuturesUnordered<_> = closers
            .into_iter()
            .map(|hook| {
                let site = hook.site;
                let task = tokio::spawn((hook.run)());
                async move {
                    let failure = tokio::select! {
                        biased;
                        joined = task => match joined {
                            Ok(Ok(())) => None,
                            Ok(Err(e)) => Some(CloseFailure::Failed(e)),
                            Err(e) => Some(CloseFailure::Panicked(e.to_string())),
                        },
                        cause = cx.done() => Some(CloseFailure::Interrupted(cause)),
                    };
                    failure.map(|failure| CloserFailure { site, failure })
                }
            })
            .collect();

        let mut failures = Vec::new();
        while let Some(result) = pending.next().await {
            if let Some(failure) = result {
                tracing::warn!(site = %failure.site, error = %failure.failure, "Closer failed");
                failures.push(failure);
            }
        }

        // Dropped outside the lock: instance destructors may touch the container.
        let released = {
            let mut state = self.state.lock();
            (
                mem::take(&mut state.instances),
                mem::take(&mut state.checkers),
                state.config.take(),
            )
        };
        drop(released);

        metrics::record_close(total, failures.len());
        if failures.is_empty() {
            tracing::info!("Container closed");
            Ok(())
        } else {
            Err(ShutdownError { failures })
        }
    }
}
