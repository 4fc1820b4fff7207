//! One configuration section backed by one file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use notify::RecommendedWatcher;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::env;
use crate::config::format::ConfigFormat;
use crate::config::loader::{load_tree, ConfigError};
use crate::config::watcher::SourceWatcher;

pub(crate) type Subscriber = Arc<dyn Fn(&ConfigSource) + Send + Sync>;

/// Lowercase every object key, recursively. On a case-only collision the
/// key that sorts last wins.
fn lowercase_keys(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.to_lowercase(), lowercase_value(value)))
        .collect()
}

fn lowercase_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(lowercase_keys(map)),
        Value::Array(items) => Value::Array(items.iter().map(lowercase_value).collect()),
        other => other.clone(),
    }
}

/// A loaded section.
///
/// The file tree is swapped atomically on reload; readers always see either
/// the old or the new document. Environment overrides are applied on every
/// read, not stored.
pub struct ConfigSource {
    name: String,
    path: PathBuf,
    format: ConfigFormat,
    tree: ArcSwap<Map<String, Value>>,
    subscribers: Mutex<Vec<Subscriber>>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl ConfigSource {
    pub(crate) fn open(name: &str, path: PathBuf, format: ConfigFormat) -> Result<Self, ConfigError> {
        let tree = load_tree(&path, format)?;
        Ok(Self {
            name: name.to_owned(),
            path,
            format,
            tree: ArcSwap::from_pointee(tree),
            subscribers: Mutex::new(Vec::new()),
            watcher: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    /// The effective document: file contents with keys lowercased and env
    /// overrides applied. Struct fields are therefore matched against
    /// lowercase keys.
    pub fn raw(&self) -> Value {
        let mut tree = lowercase_keys(&self.tree.load());
        let applied = env::apply_overrides(&self.name, &mut tree);
        if applied > 0 {
            tracing::debug!(section = %self.name, overrides = applied, "Applied env overrides");
        }
        Value::Object(tree)
    }

    /// Deserialize the effective document into `T`.
    pub fn unmarshal<T>(&self) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(self.raw()).map_err(|source| ConfigError::Deserialize {
            path: self.path.clone(),
            source,
        })
    }

    /// Re-read the file. Returns whether the document changed.
    ///
    /// On error the current document is kept. Watch subscribers are called
    /// after every successful reload, changed or not.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let fresh = load_tree(&self.path, self.format)?;
        if **self.tree.load() == fresh {
            return Ok(false);
        }
        self.tree.store(Arc::new(fresh));
        Ok(true)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Add a change callback, starting the file watcher on first use.
    pub(crate) fn subscribe(self: &Arc<Self>, subscriber: Subscriber) -> Result<(), ConfigError> {
        let mut watcher = self.watcher.lock();
        if watcher.is_none() {
            let started = SourceWatcher::new(self)
                .run()
                .map_err(|source| ConfigError::Watch {
                    path: self.path.clone(),
                    source,
                })?;
            *watcher = Some(started);
        }
        self.push_subscriber(subscriber);
        Ok(())
    }

    pub(crate) fn push_subscriber(&self, subscriber: Subscriber) {
        self.subscribers.lock().push(subscriber);
    }

    /// Invoke every subscriber, in registration order.
    pub(crate) fn notify_subscribers(&self) {
        let subscribers = self.subscribers.lock().clone();
        for subscriber in subscribers {
            subscriber(self);
        }
    }
}

impl fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSource")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("format", &self.format)
            .field("subscribers", &self.subscriber_count())
            .field("watching", &self.watcher.lock().is_some())
            .finish()
    }
}
