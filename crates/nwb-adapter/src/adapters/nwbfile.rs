use std::path::Path;

use nwb_container::{NwbFile, NwbReader, ReadSession, WriteManager};
use tracing::info;

use crate::adapter::{AttributeAdapter, AttributeType};
use crate::error::Result;
use crate::layout::{to_token, StageLayout};
use crate::writer::write_nwb;

/// A session container together with the read session it came from.
///
/// Containers built in memory have no session. Containers returned by
/// [`NwbFileAdapter::get`] carry the session whose manager a later series
/// write continues.
#[derive(Debug, Clone)]
pub struct NwbHandle {
    pub file: NwbFile,
    pub session: Option<ReadSession>,
}

impl NwbHandle {
    pub fn new(file: NwbFile) -> Self {
        Self {
            file,
            session: None,
        }
    }

    pub fn manager(&self) -> Option<&WriteManager> {
        self.session.as_ref().map(ReadSession::manager)
    }
}

impl From<NwbFile> for NwbHandle {
    fn from(file: NwbFile) -> Self {
        Self::new(file)
    }
}

/// Stores a whole session container as `session/<identifier>.<ext>`.
#[derive(Debug, Clone)]
pub struct NwbFileAdapter {
    store_name: String,
    layout: StageLayout,
}

impl NwbFileAdapter {
    pub fn new(store_name: impl Into<String>, layout: StageLayout) -> Self {
        Self {
            store_name: store_name.into(),
            layout,
        }
    }
}

impl AttributeAdapter for NwbFileAdapter {
    type Value = NwbFile;
    type Output = NwbHandle;
    type Token = String;

    fn attribute_type(&self) -> AttributeType {
        AttributeType::Filepath {
            store: self.store_name.clone(),
        }
    }

    fn put(&self, nwb: &NwbFile) -> Result<String> {
        let path = self.layout.session_path(&nwb.identifier)?;
        info!(identifier = %nwb.identifier, path = %path.display(), "Write NWBFile");

        write_nwb(&path, nwb, None)?;
        Ok(to_token(&path))
    }

    fn get(&self, path: &String) -> Result<NwbHandle> {
        let (file, session) = NwbReader::open(Path::new(path))?;
        Ok(NwbHandle {
            file,
            session: Some(session),
        })
    }
}
