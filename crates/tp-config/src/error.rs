//! Configuration and index loading errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from settings and watch config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("settings file not found: {0}")]
    NotFound(PathBuf),

    #[error("could not determine host IP address")]
    NoHostIp,
}

/// Errors from reading a single index file.
///
/// Both variants degrade only the index they came from.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("could not read index file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid index file {path}: line {line} has {fields} fields (at most 3)")]
    Malformed {
        path: PathBuf,
        line: usize,
        fields: usize,
    },
}

impl From<ConfigError> for tp_common::Error {
    fn from(err: ConfigError) -> Self {
        tp_common::Error::Config(err.to_string())
    }
}

impl From<IndexError> for tp_common::Error {
    fn from(err: IndexError) -> Self {
        tp_common::Error::IndexRead(err.to_string())
    }
}
