//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! <dir>/<section>.<env>.<json|yaml|yml|toml>
//!     → manager.rs (scan directory, one source per section)
//!     → loader.rs (read & parse via format.rs)
//!     → source.rs (tree held in an ArcSwap)
//!     → unmarshal: env.rs overrides → serde_json::from_value::<T>
//!
//! Unknown section on unmarshal:
//!     format.rs detects the default content's format
//!     → loader.rs writes it to <dir>/<section>.<env>.<ext>
//!     → registered like any loaded section
//!
//! On file change:
//!     watcher.rs (notify) → source.rs reload → atomic swap
//!     → subscribers called with &ConfigSource
//! ```
//!
//! # Design Decisions
//! - Every format is normalised to a `serde_json` tree
//! - Env overrides are applied per read, so they never leak into reloads
//! - A failed reload keeps the current tree and is only logged
//! - Every successful reload notifies, even when the content is unchanged
//! - An empty read (save caught mid-write) is skipped, not reported as a failure

pub mod env;
pub mod format;
pub mod loader;
pub mod manager;
pub mod source;
mod watcher;

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

pub use format::{ConfigFormat, ParseError};
pub use loader::ConfigError;
pub use manager::ConfigManager;
pub use source::ConfigSource;

/// Deployment environment; the middle part of every section file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConfigEnv {
    Test,
    Dev,
    Prod,
    Custom(String),
}

impl ConfigEnv {
    pub fn as_str(&self) -> &str {
        match self {
            ConfigEnv::Test => "test",
            ConfigEnv::Dev => "dev",
            ConfigEnv::Prod => "prod",
            ConfigEnv::Custom(name) => name,
        }
    }
}

impl fmt::Display for ConfigEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigEnv {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "test" => ConfigEnv::Test,
            "dev" => ConfigEnv::Dev,
            "prod" => ConfigEnv::Prod,
            other => ConfigEnv::Custom(other.to_owned()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_env_round_trip() {
        assert_eq!(ConfigEnv::Prod.to_string(), "prod");
        assert_eq!("dev".parse::<ConfigEnv>().unwrap(), ConfigEnv::Dev);
        assert_eq!(
            "staging".parse::<ConfigEnv>().unwrap(),
            ConfigEnv::Custom("staging".into())
        );
        assert_eq!(ConfigEnv::Custom("staging".into()).as_str(), "staging");
    }
}
