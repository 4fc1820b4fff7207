//! Section registry for one config directory and environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::de::DeserializeOwned;

use crate::config::format::ConfigFormat;
use crate::config::loader::{self, ConfigError};
use crate::config::source::ConfigSource;
use crate::config::ConfigEnv;

/// All sections of one environment, keyed by section name.
///
/// A section is the file `<dir>/<section>.<env>.<ext>`. Sections missing at
/// load time are created on first [`unmarshal`](Self::unmarshal) from the
/// caller's default content.
#[derive(Debug)]
pub struct ConfigManager {
    dir: PathBuf,
    env: ConfigEnv,
    sources: DashMap<String, Arc<ConfigSource>>,
}

/// Split `file_name` into section name and extension if it belongs to `env`.
fn section_of<'a>(file_name: &'a str, env: &str) -> Option<(&'a str, &'a str)> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    let section = stem.strip_suffix(env)?.strip_suffix('.')?;
    if section.is_empty() {
        return None;
    }
    Some((section, ext))
}

impl ConfigManager {
    /// Read every section file for `env` in `dir`.
    pub fn load(dir: impl AsRef<Path>, env: ConfigEnv) -> Result<Self, ConfigError> {
        let dir = dir.as_ref().to_path_buf();
        let io_err = |source| ConfigError::Io {
            path: dir.clone(),
            source,
        };

        let sources = DashMap::new();
        for entry in fs::read_dir(&dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let Some((section, ext)) = section_of(file_name, env.as_str()) else {
                continue;
            };
            let Some(format) = ConfigFormat::from_extension(ext) else {
                return Err(ConfigError::UnsupportedFormat { path });
            };
            if sources.contains_key(section) {
                return Err(ConfigError::DuplicateSection {
                    section: section.to_owned(),
                    path,
                });
            }
            let section = section.to_owned();
            let source = ConfigSource::open(&section, path, format)?;
            tracing::debug!(section = %section, path = ?source.path(), format = %format, "Config section loaded");
            sources.insert(section, Arc::new(source));
        }

        tracing::info!(dir = ?dir, env = %env, sections = sources.len(), "Configuration loaded");
        Ok(Self { dir, env, sources })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn env(&self) -> &ConfigEnv {
        &self.env
    }

    /// Names of the registered sections, sorted.
    pub fn sections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn contains(&self, section: &str) -> bool {
        self.sources.contains_key(section)
    }

    pub fn source(&self, section: &str) -> Option<Arc<ConfigSource>> {
        self.sources.get(section).map(|entry| entry.value().clone())
    }

    /// The source for `section`, writing `default_content` to a new file
    /// first if the section does not exist yet.
    ///
    /// An existing file (for example one written by another process since
    /// load) is adopted as-is.
    pub fn source_or_bootstrap(
        &self,
        section: &str,
        default_content: &[u8],
    ) -> Result<Arc<ConfigSource>, ConfigError> {
        if let Some(source) = self.source(section) {
            return Ok(source);
        }

        match self.sources.entry(section.to_owned()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let format = ConfigFormat::detect(default_content).ok_or_else(|| {
                    ConfigError::UndetectableFormat {
                        section: section.to_owned(),
                    }
                })?;
                let path = self
                    .dir
                    .join(format!("{}.{}.{}", section, self.env, format.extension()));
                if loader::write_default(&path, default_content)? {
                    tracing::info!(section = %section, path = ?path, "Default config file created");
                } else {
                    tracing::warn!(section = %section, path = ?path, "Config file appeared after load, using it");
                }
                let source = Arc::new(ConfigSource::open(section, path, format)?);
                entry.insert(source.clone());
                Ok(source)
            }
        }
    }

    /// Deserialize `section` into `T`, bootstrapping it from
    /// `default_content` if needed.
    pub fn unmarshal<T>(&self, section: &str, default_content: &[u8]) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
    {
        self.source_or_bootstrap(section, default_content)?.unmarshal()
    }

    /// Call `on_change` after every reload of `section` that changed its
    /// contents. Callbacks run on the watcher thread.
    pub fn watch<F>(&self, section: &str, on_change: F) -> Result<(), ConfigError>
    where
        F: Fn(&ConfigSource) + Send + Sync + 'static,
    {
        let source = self.source(section).ok_or_else(|| ConfigError::UnknownSection {
            section: section.to_owned(),
        })?;
        source.subscribe(Arc::new(on_change))
    }

    /// Bootstrap `section`, call `on_change` once with the current contents,
    /// then [`watch`](Self::watch) it.
    pub fn unmarshal_and_watch<F>(
        &self,
        section: &str,
        default_content: &[u8],
        on_change: F,
    ) -> Result<(), ConfigError>
    where
        F: Fn(&ConfigSource) + Send + Sync + 'static,
    {
        let source = self.source_or_bootstrap(section, default_content)?;
        on_change(source.as_ref());
        source.subscribe(Arc::new(on_change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[test]
    fn test_section_of() {
        assert_eq!(section_of("config.test.json", "test"), Some(("config", "json")));
        assert_eq!(section_of("health-check.prod.yml", "prod"), Some(("health-check", "yml")));
        assert_eq!(section_of("a.b.test.toml", "test"), Some(("a.b", "toml")));
        assert_eq!(section_of("config.dev.json", "test"), None);
        assert_eq!(section_of("mytest.json", "test"), None);
        assert_eq!(section_of(".test.json", "test"), None);
        assert_eq!(section_of("README", "test"), None);
    }

    #[test]
    fn test_load_registers_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.test.json"), r#"{"key": "value"}"#).unwrap();
        fs::write(dir.path().join("db.test.yml"), "url: postgres://localhost\n").unwrap();
        fs::write(dir.path().join("db.prod.yml"), "url: postgres://prod\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir(dir.path().join("nested.test.json")).unwrap();

        let manager = ConfigManager::load(dir.path(), ConfigEnv::Test).unwrap();
        assert_eq!(manager.sections(), vec!["config".to_string(), "db".to_string()]);

        let result: HashMap<String, String> = manager.unmarshal("config", b"").unwrap();
        assert_eq!(result["key"], "value");
    }

    #[test]
    fn test_load_rejects_duplicates_and_unknown_types() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("db.test.json"), "{}").unwrap();
        fs::write(dir.path().join("db.test.yaml"), "a: 1\n").unwrap();
        let err = ConfigManager::load(dir.path(), ConfigEnv::Test).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateSection { ref section, .. } if section == "db"));

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("db.test.ini"), "a=1").unwrap();
        let err = ConfigManager::load(dir.path(), ConfigEnv::Test).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_load_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigManager::load(dir.path().join("absent"), ConfigEnv::Dev).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_bootstrap_writes_default_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::load(dir.path(), ConfigEnv::Test).unwrap();

        let default = br#"{"key": "default"}"#;
        let result: HashMap<String, String> = manager.unmarshal("cfg", default).unwrap();
        assert_eq!(result["key"], "default");

        let written = fs::read(dir.path().join("cfg.test.json")).unwrap();
        assert_eq!(written, default);
        assert!(manager.contains("cfg"));

        // Second call reads the registered source, not the new default.
        let again: HashMap<String, String> = manager.unmarshal("cfg", br#"{"key": "other"}"#).unwrap();
        assert_eq!(again["key"], "default");
    }

    #[test]
    fn test_bootstrap_detects_yaml_and_toml() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::load(dir.path(), ConfigEnv::Custom("qa".into())).unwrap();

        let _: serde_json::Value = manager.unmarshal("cache", b"ttl: 30\n").unwrap();
        let _: serde_json::Value = manager.unmarshal("queue", b"depth = 10\n").unwrap();

        assert!(dir.path().join("cache.qa.yaml").is_file());
        assert!(dir.path().join("queue.qa.toml").is_file());
    }

    #[test]
    fn test_bootstrap_rejects_undetectable_default() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::load(dir.path(), ConfigEnv::Test).unwrap();

        for default in [&b""[..], &b"plain words"[..]] {
            let err = manager.unmarshal::<serde_json::Value>("svc", default).unwrap_err();
            assert!(matches!(err, ConfigError::UndetectableFormat { .. }));
        }
        assert!(!manager.contains("svc"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_env_overrides_on_unmarshal() {
        #[derive(Deserialize)]
        struct Nested {
            age: i64,
        }
        #[derive(Deserialize)]
        struct Settings {
            key: String,
            nested: Nested,
        }

        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("mgrenv.test.yaml"),
            "key: \"value\"\nnested:\n  age: 21\n",
        )
        .unwrap();
        let manager = ConfigManager::load(dir.path(), ConfigEnv::Test).unwrap();

        std::env::set_var("MGRENV_KEY", "env_value");
        std::env::set_var("MGRENV_NESTED_AGE", "18");
        let result: Settings = manager.unmarshal("mgrenv", b"").unwrap();
        std::env::remove_var("MGRENV_KEY");
        std::env::remove_var("MGRENV_NESTED_AGE");

        assert_eq!(result.key, "env_value");
        assert_eq!(result.nested.age, 18);
    }

    #[test]
    fn test_watch_unknown_section() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::load(dir.path(), ConfigEnv::Test).unwrap();
        let err = manager.watch("missing", |_| {}).unwrap_err();
        assert_eq!(err.to_string(), "config \"missing\" not found");
    }

    #[test]
    fn test_unmarshal_and_watch_calls_back_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::load(dir.path(), ConfigEnv::Test).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();

        manager
            .unmarshal_and_watch("live", br#"{"key": "default"}"#, move |source| {
                let value: HashMap<String, String> = source.unmarshal().unwrap();
                let _ = tx.send(value["key"].clone());
            })
            .unwrap();

        assert_eq!(rx.try_recv().unwrap(), "default");
        assert_eq!(manager.source("live").unwrap().subscriber_count(), 1);
    }
}
