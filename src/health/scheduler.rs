//! Periodic health scans.
//!
//! # States
//! ```text
//! NotStarted → Running → Stopped
//! ```
//! Stopped is terminal. Starting again means calling
//! [`Container::run_health_check`] for a new scheduler.
//!
//! [`Container::run_health_check`]: crate::container::Container::run_health_check

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::container::WeakContainer;
use crate::health::HealthError;
use crate::lifecycle::{Context, Shutdown};

/// Scheduler state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    NotStarted = 0,
    Running = 1,
    Stopped = 2,
}

impl From<u8> for SchedulerState {
    fn from(val: u8) -> Self {
        match val {
            1 => SchedulerState::Running,
            2 => SchedulerState::Stopped,
            _ => SchedulerState::NotStarted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("health check period must be greater than zero")]
    ZeroPeriod,
}

/// Handle to one running health scheduler.
///
/// Dropping the handle does not stop the scheduler; [`stop`](Self::stop) or
/// closing the container does.
#[derive(Debug, Clone)]
pub struct HealthScheduler {
    shutdown: Arc<Shutdown>,
    state: Arc<AtomicU8>,
}

impl HealthScheduler {
    pub(crate) fn new(shutdown: Arc<Shutdown>) -> Self {
        Self {
            shutdown,
            state: Arc::new(AtomicU8::new(SchedulerState::NotStarted as u8)),
        }
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == SchedulerState::Stopped
    }

    /// Stop future ticks. A scan already in progress runs to completion.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    fn mark_running(&self) {
        let _ = self.state.compare_exchange(
            SchedulerState::NotStarted as u8,
            SchedulerState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn mark_stopped(&self) {
        self.state.store(SchedulerState::Stopped as u8, Ordering::Release);
    }
}

/// The loop behind a [`HealthScheduler`].
pub(crate) struct ScanLoop<F> {
    pub container: WeakContainer,
    pub period: Duration,
    pub timeout: Duration,
    pub handler: F,
    pub scheduler: HealthScheduler,
}

impl<F, Fut> ScanLoop<F>
where
    F: FnMut(Vec<HealthError>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    pub(crate) async fn run(mut self) {
        let cx = Context::background().listening_to(&self.scheduler.shutdown);
        self.scheduler.mark_running();

        tracing::info!(
            period_ms = self.period.as_millis() as u64,
            timeout_ms = self.timeout.as_millis() as u64,
            "Health scheduler starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cx.done() => {
                    tracing::info!("Health scheduler received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    let Some(container) = self.container.upgrade() else {
                        tracing::debug!("Container dropped, health scheduler exiting");
                        break;
                    };
                    let scan = if self.timeout.is_zero() {
                        cx.clone()
                    } else {
                        cx.with_timeout(self.timeout)
                    };
                    let errors = container.check_health(&scan).await;
                    drop(container);
                    (self.handler)(errors).await;
                }
            }
        }

        self.scheduler.mark_stopped();
    }
}
