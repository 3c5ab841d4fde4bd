//! Session containers and their on-disk format.
//!
//! A container file holds one [`NwbFile`] graph: its devices, intracellular
//! electrodes, and acquisition series. Files are written whole and read
//! whole; there is no in-place append.
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use nwb_container::{Device, NwbFile, NwbReader, NwbWriter};
//!
//! let mut nwb = NwbFile::new("sess01", "patch session", Utc::now());
//! nwb.add_device(Device::new("amp1")).unwrap();
//!
//! let file = std::fs::File::create("sess01.nwb").unwrap();
//! NwbWriter::new(file, None).write(&nwb).unwrap();
//!
//! // The read session's manager keeps object ids stable on the next write.
//! let (nwb, session) = NwbReader::open("sess01.nwb").unwrap();
//! let file = std::fs::File::create("copy.nwb").unwrap();
//! NwbWriter::new(file, Some(session.manager())).write(&nwb).unwrap();
//! ```

pub mod error;
pub mod format;
pub mod io;
pub mod manager;
pub mod model;

pub use error::ContainerError;
pub use format::BodyChecksum;
pub use io::{NwbReader, NwbWriter};
pub use manager::{ReadSession, WriteManager};
pub use model::{
    Acquisition, Device, IntracellularElectrode, NeurodataType, NwbFile, ObjectRef,
    PatchClampSeries, TimeSeries,
};
