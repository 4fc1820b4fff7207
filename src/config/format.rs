//! Serialization formats of configuration files.
//!
//! Every format is parsed into the same tree (`serde_json::Map`), so env
//! overrides and deserialization do not care where a section came from.
//! The top level of a document must be a key/value map, and an empty
//! (whitespace-only) document is rejected in every format.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("document is empty")]
    Empty,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML document is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Trial order used by [`detect`](Self::detect).
    pub const DETECTION_ORDER: [ConfigFormat; 3] =
        [ConfigFormat::Json, ConfigFormat::Yaml, ConfigFormat::Toml];

    /// Map a file extension (without the dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(ConfigFormat::Json),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }

    /// Extension used when writing a file of this format.
    pub fn extension(self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
        }
    }

    /// Guess the format of `content` by parsing it as JSON, then YAML, then
    /// TOML. The first successful parse wins.
    pub fn detect(content: &[u8]) -> Option<Self> {
        Self::DETECTION_ORDER
            .into_iter()
            .find(|format| format.parse(content).is_ok())
    }

    pub fn parse(self, content: &[u8]) -> Result<Map<String, Value>, ParseError> {
        if content.iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError::Empty);
        }
        let tree = match self {
            ConfigFormat::Json => serde_json::from_slice(content)?,
            ConfigFormat::Yaml => serde_yaml::from_slice(content)?,
            ConfigFormat::Toml => toml::from_str(std::str::from_utf8(content)?)?,
        };
        Ok(tree)
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
