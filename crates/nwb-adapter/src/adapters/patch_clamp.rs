//! Patch-clamp series stored inside a snapshot of their parent container.
//!
//! A series has no file of its own. `put` copies the parent container,
//! attaches the series with its electrode and device, and writes the whole
//! copy to `membrane_potential/<identifier>_<series>.<ext>`. When the parent
//! was read from disk, its session manager is carried into the write so the
//! parent's objects keep their ids in the series file.

use std::path::{Path, PathBuf};

use nwb_container::{NwbReader, PatchClampSeries, ReadSession};
use tracing::{debug, info};

use crate::adapter::{AttributeAdapter, AttributeType};
use crate::adapters::NwbHandle;
use crate::error::{AdapterError, Result};
use crate::layout::{to_token, StageLayout};
use crate::writer::write_nwb;

/// A series paired with the container it belongs to.
#[derive(Debug, Clone)]
pub struct SessionSeries {
    pub parent: NwbHandle,
    pub series: PatchClampSeries,
}

impl SessionSeries {
    pub fn new(parent: impl Into<NwbHandle>, series: PatchClampSeries) -> Self {
        Self {
            parent: parent.into(),
            series,
        }
    }
}

/// A series read back from its file, with the session it was read in.
#[derive(Debug, Clone)]
pub struct OpenSeries {
    pub series: PatchClampSeries,
    pub session: ReadSession,
}

#[derive(Debug, Clone)]
pub struct PatchClampSeriesAdapter {
    store_name: String,
    layout: StageLayout,
}

impl PatchClampSeriesAdapter {
    pub fn new(store_name: impl Into<String>, layout: StageLayout) -> Self {
        Self {
            store_name: store_name.into(),
            layout,
        }
    }

    /// Read the series called `name` from the file at `path`.
    pub fn get_named(&self, path: &str, name: &str) -> Result<OpenSeries> {
        let path = PathBuf::from(path);
        let (nwb, session) = NwbReader::open(&path)?;
        let series = nwb
            .patch_clamp_series()
            .find(|s| s.name == name)
            .cloned()
            .ok_or(AdapterError::SeriesNotFound { path })?;
        Ok(OpenSeries { series, session })
    }
}

/// Series name encoded in `<identifier>_<series>.<ext>`.
fn name_from_file(path: &Path, identifier: &str) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(identifier)?
        .strip_prefix('_')
        .map(str::to_string)
}

impl AttributeAdapter for PatchClampSeriesAdapter {
    type Value = SessionSeries;
    type Output = OpenSeries;
    type Token = String;

    fn attribute_type(&self) -> AttributeType {
        AttributeType::Filepath {
            store: self.store_name.clone(),
        }
    }

    fn put(&self, value: &SessionSeries) -> Result<String> {
        let series = &value.series;
        let mut snapshot = value.parent.file.clone();
        snapshot.add_device(series.electrode.device.clone())?;
        snapshot.add_ic_electrode(series.electrode.clone())?;
        snapshot.add_acquisition(series.clone())?;

        let path = self.layout.series_path(&snapshot.identifier, &series.name)?;
        info!(
            identifier = %snapshot.identifier,
            series = %series.name,
            path = %path.display(),
            "Write PatchClampSeries"
        );

        write_nwb(&path, &snapshot, value.parent.manager())?;
        Ok(to_token(&path))
    }

    fn get(&self, path: &String) -> Result<OpenSeries> {
        let path = PathBuf::from(path);
        let (nwb, session) = NwbReader::open(&path)?;

        let mut candidates: Vec<&PatchClampSeries> = nwb.patch_clamp_series().collect();
        let series = match candidates.len() {
            0 => return Err(AdapterError::SeriesNotFound { path }),
            1 => candidates.remove(0),
            _ => {
                let wanted = name_from_file(&path, &nwb.identifier);
                debug!(
                    path = %path.display(),
                    count = candidates.len(),
                    wanted = ?wanted,
                    "Several PatchClampSeries in file, selecting by file name"
                );
                match candidates
                    .iter()
                    .position(|s| Some(&s.name) == wanted.as_ref())
                {
                    Some(idx) => candidates.remove(idx),
                    None => {
                        return Err(AdapterError::AmbiguousSeries {
                            candidates: candidates.iter().map(|s| s.name.clone()).collect(),
                            path,
                        })
                    }
                }
            }
        };

        Ok(OpenSeries {
            series: series.clone(),
            session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_from_file() {
        let path = Path::new("/stage/membrane_potential/sess_01_sweep_2.nwb");
        assert_eq!(name_from_file(path, "sess_01"), Some("sweep_2".to_string()));
        assert_eq!(name_from_file(path, "other"), None);
        assert_eq!(
            name_from_file(Path::new("/stage/session/sess_01.nwb"), "sess_01"),
            None
        );
    }
}
