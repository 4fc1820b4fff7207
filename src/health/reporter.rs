//! Health reports pushed to an operator channel.
//!
//! The reporter reads its settings from a configuration section (created
//! with the built-in default on first use), keeps `notify_level` hot-reloaded,
//! and runs a scheduler whose handler forwards everything at or above that
//! level to a [`Notifier`] as a Markdown report. The scan period and per-scan
//! timeout are read once, when the reporter starts.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, ConfigSource};
use crate::container::Container;
use crate::health::{HealthError, HealthScheduler, Level, ScheduleError};
use crate::provider::BoxError;

/// Configuration section the reporter reads by default.
pub const DEFAULT_SECTION: &str = "health-check";

const DEFAULT_CONFIG: &[u8] = br#"# Health check reporting
#
# This file is watched and reloaded automatically, changes to
# notify_level apply without restarting the service.

# Lowest level that is reported.
# Available levels are: "debug", "info", "warn", "error", "fatal"
notify_level: "debug"
# Seconds between two scans (read at start-up).
interval_secs: 60
# Per-scan deadline in seconds, 0 disables it (read at start-up).
timeout_secs: 5
"#;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthReportConfig {
    pub notify_level: Level,
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for HealthReportConfig {
    fn default() -> Self {
        Self {
            notify_level: Level::Debug,
            interval_secs: 60,
            timeout_secs: 5,
        }
    }
}

/// Delivers rendered health reports somewhere an operator will see them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, report: &str) -> Result<(), BoxError>;
}

/// A notifier that writes reports to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, report: &str) -> Result<(), BoxError> {
        tracing::warn!(report = %report, "Health check report");
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Keep only the errors at or above `level`.
pub fn filter_at_least(errors: Vec<HealthError>, level: Level) -> Vec<HealthError> {
    errors.into_iter().filter(|e| e.is_at_least(level)).collect()
}

/// Render errors as a Markdown document.
pub fn render_markdown(errors: &[HealthError]) -> String {
    let mut out = String::from("# Health Check\n");
    for err in errors {
        let _ = write!(
            out,
            "\n### Error Level: {}\n\n- **Message**: {}\n",
            err.level, err.message
        );
    }
    out
}

/// Start reporting health errors of `container` to `notifier`.
pub fn spawn_health_reporter(
    container: &Container,
    notifier: Arc<dyn Notifier>,
    section: &str,
) -> Result<HealthScheduler, ReportError> {
    let current = Arc::new(RwLock::new(HealthReportConfig::default()));

    let slot = current.clone();
    let name = section.to_string();
    container.unmarshal_and_watch_config(section, DEFAULT_CONFIG, move |source: &ConfigSource| {
        match source.unmarshal::<HealthReportConfig>() {
            Ok(cfg) => {
                tracing::info!(section = %name, notify_level = %cfg.notify_level, "Health report config loaded");
                *slot.write() = cfg;
            }
            Err(e) => {
                tracing::error!(section = %name, error = %e, "Failed to load health report config");
            }
        }
    })?;

    let cfg = current.read().clone();
    let scheduler = container.run_health_check(
        Duration::from_secs(cfg.interval_secs),
        Duration::from_secs(cfg.timeout_secs),
        move |errors| {
            let notifier = notifier.clone();
            let threshold = current.read().notify_level;
            async move {
                let reported = filter_at_least(errors, threshold);
                if reported.is_empty() {
                    return;
                }
                let report = render_markdown(&reported);
                if let Err(e) = notifier.notify(&report).await {
                    tracing::error!(error = %e, "Failed to deliver health report");
                }
            }
        },
    )?;

    Ok(scheduler)
}
