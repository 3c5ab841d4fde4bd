use std::path::PathBuf;

use nwb_container::ContainerError;
use thiserror::Error;

/// Configuration errors. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing config key `{key}`; expected:\n{expected}")]
    MissingKey { key: String, expected: String },

    #[error("store `{store}` is not defined; expected a `[stores.{store}]` section with a `stage` path")]
    MissingStore { store: String },

    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Everything an adapter can fail with.
///
/// Container and write failures pass through as [`AdapterError::Container`]
/// with the original error untouched.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("missing field `{field}` in stored value")]
    MissingField { field: String },

    #[error("field `{field}` must be {expected}")]
    MalformedField {
        field: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("name {name:?} cannot be used as a file name: it {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("no PatchClampSeries found in {path}")]
    SeriesNotFound { path: PathBuf },

    #[error("{path} holds several PatchClampSeries ({candidates:?}) and none matches its file name")]
    AmbiguousSeries {
        path: PathBuf,
        candidates: Vec<String>,
    },
}

pub type Result<T, E = AdapterError> = std::result::Result<T, E>;
