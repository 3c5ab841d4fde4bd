//! Stage directory layout.
//!
//! ```text
//! {stage_dir}/
//! ├── session/
//! │   └── {identifier}.nwb             # one per session container
//! └── membrane_potential/
//!     └── {identifier}_{series}.nwb    # one per patch-clamp series
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::AdapterConfig;
use crate::error::{AdapterError, Result};

pub const SESSION_DIR: &str = "session";
pub const MEMBRANE_POTENTIAL_DIR: &str = "membrane_potential";

#[derive(Debug, Clone)]
pub struct StageLayout {
    stage_dir: PathBuf,
    extension: String,
}

impl StageLayout {
    pub fn new(stage_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            stage_dir: stage_dir.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &AdapterConfig) -> Self {
        Self::new(config.stage_dir.clone(), config.extension.clone())
    }

    /// Create both staging directories. Safe to call repeatedly.
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.session_dir(), self.membrane_potential_dir()] {
            fs::create_dir_all(&dir).map_err(|source| AdapterError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        debug!(stage_dir = %self.stage_dir.display(), "Stage layout ready");
        Ok(())
    }

    pub fn stage_dir(&self) -> &Path {
        &self.stage_dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn session_dir(&self) -> PathBuf {
        self.stage_dir.join(SESSION_DIR)
    }

    pub fn membrane_potential_dir(&self) -> PathBuf {
        self.stage_dir.join(MEMBRANE_POTENTIAL_DIR)
    }

    /// `{stage}/session/{identifier}.{ext}`
    pub fn session_path(&self, identifier: &str) -> Result<PathBuf> {
        check_name(identifier)?;
        Ok(self
            .session_dir()
            .join(format!("{identifier}.{}", self.extension)))
    }

    /// `{stage}/membrane_potential/{identifier}_{series}.{ext}`
    pub fn series_path(&self, identifier: &str, series_name: &str) -> Result<PathBuf> {
        check_name(identifier)?;
        check_name(series_name)?;
        Ok(self
            .membrane_potential_dir()
            .join(format!("{identifier}_{series_name}.{}", self.extension)))
    }
}

/// Names become a single file name component; they may not walk out of the
/// stage or into a subdirectory.
fn check_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("is empty")
    } else if name == "." || name == ".." {
        Some("is a relative directory")
    } else if name.contains(['/', '\\']) {
        Some("contains a path separator")
    } else if name.contains('\0') {
        Some("contains a NUL byte")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(AdapterError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Render a path the way it is stored as a token: forward slashes throughout.
pub fn to_token(path: &Path) -> String {
    let rendered = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        rendered.into_owned()
    } else {
        rendered.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() -> anyhow::Result<()> {
        let layout = StageLayout::new("/stage", "nwb");
        assert_eq!(layout.session_path("sess01")?, PathBuf::from("/stage/session/sess01.nwb"));
        assert_eq!(
            layout.series_path("sess01", "sweep1")?,
            PathBuf::from("/stage/membrane_potential/sess01_sweep1.nwb")
        );
        Ok(())
    }

    #[test]
    fn test_names_that_leave_the_stage_are_rejected() {
        let layout = StageLayout::new("/stage", "nwb");
        for name in ["", ".", "..", "../../escaped", "nested/sess", "dos\\sess", "nul\0"] {
            let err = layout.session_path(name).unwrap_err();
            assert!(
                matches!(err, AdapterError::InvalidName { name: ref n, .. } if n == name),
                "{name:?} accepted"
            );
            assert!(layout.series_path("sess01", name).is_err());
            assert!(layout.series_path(name, "sweep1").is_err());
        }
    }

    #[test]
    fn test_dots_inside_names_are_allowed() -> anyhow::Result<()> {
        let layout = StageLayout::new("/stage", "nwb");
        assert_eq!(
            layout.session_path("sess..01")?,
            PathBuf::from("/stage/session/sess..01.nwb")
        );
        Ok(())
    }

    #[test]
    fn test_ensure_is_idempotent() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let layout = StageLayout::new(temp_dir.path().join("stage"), "nwb");

        layout.ensure()?;
        layout.ensure()?;

        assert!(layout.session_dir().is_dir());
        assert!(layout.membrane_potential_dir().is_dir());
        Ok(())
    }

    #[test]
    fn test_ensure_fails_when_stage_is_a_file() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let stage = temp_dir.path().join("stage");
        fs::write(&stage, b"not a directory")?;

        let err = StageLayout::new(&stage, "nwb").ensure().unwrap_err();
        assert!(matches!(err, AdapterError::Io { .. }));
        Ok(())
    }

    #[test]
    fn test_token_uses_forward_slashes() -> anyhow::Result<()> {
        let path = StageLayout::new("/stage", "nwb").session_path("s")?;
        assert_eq!(to_token(&path), "/stage/session/s.nwb");
        Ok(())
    }
}
