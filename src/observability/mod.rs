//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Providers, config sources, health scans, shutdown:
//!     → tracing events (structured fields: section, site, type)
//!     → metrics.rs (counters, gauges, histograms via the `metrics` facade)
//!
//! Consumers:
//!     → logging.rs installs a fmt subscriber for binaries and tests
//!     → the host installs a metrics recorder/exporter of its choice
//! ```

pub mod logging;
pub mod metrics;
