//! Write-session manager: stable object identity across reads and writes.
//!
//! Objects in memory carry no identity of their own. When a container is
//! written, each object is registered under `(type, name)` and given an
//! object id. A manager populated from a read hands the file's ids back out,
//! so writing the same objects again (into the same or another file) keeps
//! their identity instead of minting duplicates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::format::BodyChecksum;
use crate::model::NeurodataType;

#[derive(Debug, Clone, Default)]
pub struct WriteManager {
    ids: HashMap<(NeurodataType, String), Uuid>,
}

impl WriteManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id for `(kind, name)`, minting a fresh one on first sight.
    pub fn object_id(&mut self, kind: NeurodataType, name: &str) -> Uuid {
        *self
            .ids
            .entry((kind, name.to_string()))
            .or_insert_with(Uuid::new_v4)
    }

    /// Look up an id without registering.
    pub fn get(&self, kind: NeurodataType, name: &str) -> Option<Uuid> {
        self.ids.get(&(kind, name.to_string())).copied()
    }

    /// Record an id read from a file. Later registrations win.
    pub(crate) fn register(&mut self, kind: NeurodataType, name: &str, id: Uuid) {
        self.ids.insert((kind, name.to_string()), id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// The open-file side of a container read from disk.
///
/// The file is read completely at open, so a session holds no OS handle;
/// dropping it is the close.
#[derive(Debug, Clone)]
pub struct ReadSession {
    path: PathBuf,
    checksum: BodyChecksum,
    manager: WriteManager,
}

impl ReadSession {
    pub(crate) fn new(path: PathBuf, checksum: BodyChecksum, manager: WriteManager) -> Self {
        Self {
            path,
            checksum,
            manager,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn checksum(&self) -> &BodyChecksum {
        &self.checksum
    }

    pub fn manager(&self) -> &WriteManager {
        &self.manager
    }
}
