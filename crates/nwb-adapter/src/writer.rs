//! Atomic container writes.
//!
//! The container is written to a staging file next to the target, synced,
//! then renamed into place and the directory synced so the rename survives a
//! crash. Any failure before the rename removes the staging file and returns
//! the original error, so a file at the target path is always complete.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use nwb_container::{NwbFile, NwbWriter, WriteManager};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AdapterError, Result};

/// Removes the staging file on drop unless disarmed.
struct StagingGuard {
    path: PathBuf,
    armed: bool,
}

impl StagingGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Call after a successful rename.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove staging file"
            ),
        }
    }
}

/// Sibling path a write is staged in before the rename.
fn staging_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{file_name}.{}.partial", Uuid::new_v4().simple()))
}

/// Flush the directory entry for `path` so a completed rename is durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => File::open(".")?.sync_all(),
    }
}

// Directories cannot be opened as files here; the rename is left to the OS.
#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> AdapterError + '_ {
    move |source| AdapterError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `nwb` to `path`, optionally continuing the write session of an
/// earlier read.
///
/// Existing files are replaced whole. On error nothing new is left behind and
/// a previous complete file at `path` is untouched.
pub fn write_nwb(path: &Path, nwb: &NwbFile, manager: Option<&WriteManager>) -> Result<()> {
    let staging = staging_path(path);
    let mut guard = StagingGuard::new(staging.clone());

    let file = File::create(&staging).map_err(io_error(&staging))?;
    let mut writer = NwbWriter::new(BufWriter::new(file), manager);
    let checksum = writer.write(nwb)?;

    let file = writer
        .into_inner()
        .into_inner()
        .map_err(|e| io_error(&staging)(e.into_error()))?;
    file.sync_all().map_err(io_error(&staging))?;
    drop(file);

    fs::rename(&staging, path).map_err(io_error(path))?;
    guard.disarm();

    // The file is complete at `path` either way; only durability is at stake.
    if let Err(e) = sync_parent(path) {
        warn!(path = %path.display(), error = %e, "Failed to sync stage directory");
    }

    info!(
        path = %path.display(),
        identifier = %nwb.identifier,
        checksum = %checksum,
        "Wrote NWB container"
    );
    Ok(())
}
