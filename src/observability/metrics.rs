//! Metrics collection.
//!
//! # Metrics
//! - `ioc_provider_constructions_total` (counter): constructor runs by type, outcome
//! - `ioc_health_scans_total` (counter): completed health scans
//! - `ioc_health_errors` (gauge): errors reported by the latest scan
//! - `ioc_health_scan_duration_seconds` (histogram): scan latency
//! - `ioc_closers_total` / `ioc_closer_failures_total` (counters): shutdown outcomes
//! - `ioc_config_reloads_total` (counter): hot reloads by section, outcome
//!
//! Nothing is recorded unless the host installs a recorder.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

fn outcome(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

pub fn record_construction(type_name: &'static str, ok: bool) {
    counter!("ioc_provider_constructions_total", "type" => type_name, "outcome" => outcome(ok))
        .increment(1);
}

pub fn record_health_scan(errors: usize, elapsed: Duration) {
    counter!("ioc_health_scans_total").increment(1);
    gauge!("ioc_health_errors").set(errors as f64);
    histogram!("ioc_health_scan_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_close(closers: usize, failures: usize) {
    counter!("ioc_closers_total").increment(closers as u64);
    counter!("ioc_closer_failures_total").increment(failures as u64);
}

pub fn record_config_reload(section: &str, ok: bool) {
    counter!("ioc_config_reloads_total", "section" => section.to_string(), "outcome" => outcome(ok))
        .increment(1);
}
