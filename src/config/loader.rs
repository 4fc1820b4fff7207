//! Reading and bootstrapping section files on disk.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::format::{ConfigFormat, ParseError};

/// Error type for configuration loading, reading and watching.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not loaded")]
    NotLoaded,

    #[error("reading config directory {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("duplicate config file for section {section:?}: {path:?}")]
    DuplicateSection { section: String, path: PathBuf },

    #[error("unsupported config file type: {path:?}")]
    UnsupportedFormat { path: PathBuf },

    #[error("cannot determine the format of the default content for section {section:?}")]
    UndetectableFormat { section: String },

    #[error("error reading config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("unmarshalling config {path:?}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config {section:?} not found")]
    UnknownSection { section: String },

    #[error("error writing default config file {path:?}: {source}")]
    WriteDefault {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("watching config file {path:?}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Read and parse one section file.
pub(crate) fn load_tree(path: &Path, format: ConfigFormat) -> Result<Map<String, Value>, ConfigError> {
    let content = fs::read(path).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: ParseError::Io(source),
    })?;
    format.parse(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `content` to `path` unless the file already exists.
///
/// Returns `false` when another writer got there first; the existing file
/// is left untouched.
pub(crate) fn write_default(path: &Path, content: &[u8]) -> Result<bool, ConfigError> {
    let write_err = |source| ConfigError::WriteDefault {
        path: path.to_path_buf(),
        source,
    };
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(write_err(e)),
    };
    file.write_all(content).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    Ok(true)
}
