//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Provider constructors:
//!     Container::on_health_check(check)   (site recorded)
//!
//! Scan (Container::check_health):
//!     snapshot checks → spawn each → race each against Context
//!     → Vec<HealthError> in completion order
//!
//! Periodic (scheduler.rs):
//!     ticker → scan with per-scan timeout → handler(errors)
//!
//! Reporting (reporter.rs):
//!     handler → filter by notify_level → Markdown → Notifier
//! ```
//!
//! # Design Decisions
//! - A check returning `None` is healthy; absence of errors means healthy
//! - Timed-out checks keep running; the scan records an Error-level entry
//! - Panicking checks are reported at Fatal level

pub mod error;
pub mod reporter;
pub mod scheduler;

pub use error::{HealthError, Level, UnknownLevel};
pub use reporter::{spawn_health_reporter, HealthReportConfig, Notifier, TracingNotifier};
pub use scheduler::{HealthScheduler, ScheduleError, SchedulerState};
