//! Shared utilities for integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lifecycle_ioc::health::Notifier;
use lifecycle_ioc::BoxError;
use parking_lot::Mutex;
use tokio::time::Instant;

/// Install a test subscriber once per binary.
#[allow(dead_code)]
pub fn init_logging() {
    static INIT: once_cell::sync::OnceCell<()> = once_cell::sync::OnceCell::new();
    INIT.get_or_init(|| {
        lifecycle_ioc::observability::logging::init("lifecycle_ioc=debug");
    });
}

/// Poll `condition` every 20ms until it holds or `timeout` passes.
#[allow(dead_code)]
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Write a config section file and return its path.
#[allow(dead_code)]
pub fn write_section(dir: &Path, file_name: &str, content: &str) -> PathBuf {
    let path = dir.join(file_name);
    fs::write(&path, content).unwrap();
    path
}

/// A notifier that keeps every report it receives.
#[allow(dead_code)]
#[derive(Default)]
pub struct CapturingNotifier {
    reports: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl CapturingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().clone()
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn notify(&self, report: &str) -> Result<(), BoxError> {
        self.reports.lock().push(report.to_string());
        Ok(())
    }
}
