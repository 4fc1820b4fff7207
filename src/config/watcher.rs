//! Configuration file watcher for hot reload.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::format::ParseError;
use crate::config::loader::ConfigError;
use crate::config::source::ConfigSource;
use crate::observability::metrics;

/// Watches the file behind one [`ConfigSource`] and reloads it on change.
///
/// The parent directory is watched rather than the file, so editors that
/// save by rename-over are still seen.
pub(crate) struct SourceWatcher {
    source: Weak<ConfigSource>,
    dir: PathBuf,
    file_name: Option<OsString>,
}

impl SourceWatcher {
    pub(crate) fn new(source: &Arc<ConfigSource>) -> Self {
        let path = source.path();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            source: Arc::downgrade(source),
            dir,
            file_name: path.file_name().map(|name| name.to_os_string()),
        }
    }

    /// Start watching in a background thread. Dropping the returned watcher
    /// stops it.
    pub(crate) fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let source = self.source;
        let file_name = self.file_name;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let ours = event
                        .paths
                        .iter()
                        .any(|path| path.file_name() == file_name.as_deref());
                    if !ours || !is_content_change(&event.kind) {
                        return;
                    }
                    if let Some(source) = source.upgrade() {
                        if let Reload::Applied { changed: false } = reload(&source) {
                            tracing::debug!(section = %source.name(), "Config content unchanged");
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;

        tracing::info!(dir = ?self.dir, "Config watcher started");
        Ok(watcher)
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) | EventKind::Create(_) => true,
        _ => false,
    }
}

/// What a change event did to a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reload {
    /// Re-read and subscribers notified.
    Applied { changed: bool },
    /// The file was empty, usually a save caught between truncate and write.
    Skipped,
    Failed,
}

fn reload(source: &ConfigSource) -> Reload {
    tracing::debug!(section = %source.name(), "Config file change detected");
    match source.reload() {
        Ok(changed) => {
            tracing::info!(section = %source.name(), path = ?source.path(), "Config reloaded");
            metrics::record_config_reload(source.name(), true);
            source.notify_subscribers();
            Reload::Applied { changed }
        }
        Err(ConfigError::Parse {
            source: ParseError::Empty,
            ..
        }) => {
            tracing::debug!(section = %source.name(), "Config file empty, waiting for the write to finish");
            Reload::Skipped
        }
        Err(e) => {
            metrics::record_config_reload(source.name(), false);
            tracing::error!(
                section = %source.name(),
                "Failed to reload config: {}. Keeping current configuration.",
                e
            );
            Reload::Failed
        }
    }
}
