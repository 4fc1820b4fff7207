//! Concurrent health scans.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinError;

use crate::container::Container;
use crate::health::scheduler::ScanLoop;
use crate::health::{HealthError, HealthScheduler, ScheduleError};
use crate::lifecycle::{Context, Shutdown};
use crate::observability::metrics;

fn describe_join_error(err: &JoinError) -> &'static str {
    if err.is_panic() {
        "health check panicked"
    } else {
        "health check was cancelled"
    }
}

impl Container {
    /// Run every registered health check concurrently and collect the errors.
    ///
    /// Returns an empty list if `cx` is already done. Otherwise each check is
    /// waited on independently until it finishes or `cx` is done. A check that
    /// is still running at that point yields an [`Level::Error`] entry
    /// `"<site>: <context error>"` and is left running in the background; its
    /// eventual result is discarded. Results are in completion order.
    ///
    /// [`Level::Error`]: crate::health::Level::Error
    pub async fn check_health(&self, cx: &Context) -> Vec<HealthError> {
        if cx.err().is_some() {
            return Vec::new();
        }

        let checkers: Vec<_> = self
            .state
            .lock()
            .checkers
            .iter()
            .map(|hook| (hook.site, hook.run.clone()))
            .collect();
        let started = Instant::now();

        let mut pending: FuturesUnordered<_> = checkers
            .into_iter()
            .map(|(site, check)| {
                let task = tokio::spawn(check());
                async move {
                    tokio::select! {
                        biased;
                        joined = task => match joined {
                            Ok(result) => result,
                            Err(e) => Some(HealthError::fatal(format!("{}: {}", site, describe_join_error(&e)))),
                        },
                        cause = cx.done() => {
                            tracing::warn!(site = %site, error = %cause, "Health check did not finish in time");
                            Some(HealthError::error(format!("{}: {}", site, cause)))
                        }
                    }
                }
            })
            .collect();

        let mut errors = Vec::new();
        while let Some(result) = pending.next().await {
            if let Some(err) = result {
                errors.push(err);
            }
        }

        tracing::debug!(
            errors = errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Health scan finished"
        );
        metrics::record_health_scan(errors.len(), started.elapsed());
        errors
    }

    /// Start a periodic health scan.
    ///
    /// Every `period` (first scan one period from now) the registered checks
    /// run under a deadline of `timeout`, or with no per-scan deadline when
    /// `timeout` is zero, and `handler` receives the errors. The scheduler
    /// runs until it is stopped, the container is closed, or a newer
    /// scheduler is started on the same container.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run_health_check<F, Fut>(
        &self,
        period: Duration,
        timeout: Duration,
        handler: F,
    ) -> Result<HealthScheduler, ScheduleError>
    where
        F: FnMut(Vec<HealthError>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period.is_zero() {
            return Err(ScheduleError::ZeroPeriod);
        }

        let shutdown = Arc::new(Shutdown::new());
        if let Some(previous) = self.replace_scheduler(shutdown.clone()) {
            tracing::warn!("Replacing running health scheduler");
            previous.trigger();
        }

        let scheduler = HealthScheduler::new(shutdown);
        let scan_loop = ScanLoop {
            container: self.downgrade(),
            period,
            timeout,
            handler,
            scheduler: scheduler.clone(),
        };
        tokio::spawn(scan_loop.run());

        Ok(scheduler)
    }
}
