use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::model::NeurodataType;

/// Errors raised while building, writing, or reading a container file.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write container: {0}")]
    Sink(#[source] std::io::Error),

    #[error("not an NWB container: bad magic bytes")]
    BadMagic,

    #[error("unsupported container version {0}")]
    UnsupportedVersion(u32),

    #[error("container truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: u64, found: u64 },

    #[error("{0} unexpected bytes after container body")]
    TrailingBytes(u64),

    #[error("checksum mismatch: header says {expected}, body hashes to {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("failed to encode container body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode container body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("{kind} {name:?} references {target} which is not attached to the container")]
    Unattached {
        kind: NeurodataType,
        name: String,
        target: String,
    },

    #[error("{referrer} points at unknown object {target}")]
    DanglingReference { referrer: String, target: Uuid },

    #[error("{referrer} expects a {expected} at {target} but found a {found}")]
    MistypedReference {
        referrer: String,
        target: Uuid,
        expected: NeurodataType,
        found: NeurodataType,
    },

    #[error("{kind} {name:?} has {data} samples but {timestamps} timestamps")]
    LengthMismatch {
        kind: NeurodataType,
        name: String,
        data: usize,
        timestamps: usize,
    },

    #[error("a different {kind} named {name:?} is already attached")]
    DuplicateName { kind: NeurodataType, name: String },
}

impl ContainerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ContainerError::Io {
            path: path.into(),
            source,
        }
    }
}
